//! Conversion of find specifications into driver options.

use mongodb::options::FindOptions;

use dockeep_core::query::FindSpec;


/// Builds the driver's find options from a [`FindSpec`].
///
/// Unset fields of `spec` leave the driver defaults in place.
pub(crate) fn find_options(spec: FindSpec) -> FindOptions {
    let mut options = FindOptions::default();

    options.limit = spec.limit;
    options.skip = spec.skip;
    options.sort = spec.sort.map(|sort| sort.to_document());

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use dockeep_core::query::Sort;

    #[test]
    fn empty_spec_sets_nothing() {
        let options = find_options(FindSpec::default());

        assert_eq!(options.limit, None);
        assert_eq!(options.skip, None);
        assert_eq!(options.sort, None);
    }

    #[test]
    fn spec_maps_onto_options() {
        let options = find_options(FindSpec {
            limit: Some(10),
            skip: Some(20),
            sort: Some(Sort::desc("created")),
        });

        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.sort, Some(doc! { "created": -1 }));
    }
}
