//! Resource type definitions

use mdbform_core::provider::ResourceType;
use mdbform_core::schema::ResourceSchema;

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
}

define_resource_type!(
    GreenplumClusterType,
    crate::schema::RESOURCE_TYPE,
    crate::schema::cluster_schema
);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(GreenplumClusterType)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_type_carries_its_schema() {
        let types = resource_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name(), "greenplum_cluster");
        assert_eq!(types[0].schema().resource_type, "greenplum_cluster");
    }
}
