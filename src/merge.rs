//! Path-item + operation parameter merging
//!
//! Operation-level parameters override path-item-level ones that share the
//! same name and location. See
//! <https://spec.openapis.org/oas/v3.1.0#fixed-fields-7>.

use indexmap::{IndexMap, IndexSet};

use crate::spec::{Parameter, ParameterLocation};

/// `name → {location → parameter}`, iterated in first-declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedParameters {
    by_name: IndexMap<String, IndexMap<ParameterLocation, Parameter>>,
    /// Every `(name, location)` key in the order it was first declared
    declared: IndexSet<(String, ParameterLocation)>,
}

impl MergedParameters {
    fn insert(&mut self, param: &Parameter) {
        self.by_name
            .entry(param.name.clone())
            .or_default()
            .insert(param.location, param.clone());
        self.declared.insert((param.name.clone(), param.location));
    }

    /// Parameter names with every location they are declared in.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexMap<ParameterLocation, Parameter>)> {
        self.by_name.iter().map(|(name, locs)| (name.as_str(), locs))
    }

    pub fn get(&self, name: &str, location: ParameterLocation) -> Option<&Parameter> {
        self.by_name.get(name)?.get(&location)
    }

    /// Number of distinct locations `name` is declared in.
    pub fn location_count(&self, name: &str) -> usize {
        self.by_name.get(name).map_or(0, IndexMap::len)
    }

    /// All parameters carried in `location`, in declaration order.
    pub fn in_location(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.declared
            .iter()
            .filter(move |(_, loc)| *loc == location)
            .filter_map(move |(name, loc)| self.get(name, *loc))
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Merge path-item-level and operation-level parameters.
pub fn merge(path_item_params: &[Parameter], operation_params: &[Parameter]) -> MergedParameters {
    let mut merged = MergedParameters::default();
    for param in path_item_params.iter().chain(operation_params) {
        merged.insert(param);
    }
    merged
}
