use cost_reference::{ComplexityTier, CostCatalog, CostRange, LookupAttributes, ReferenceCostTable, TableError};
use std::io::Write;

fn write_catalog(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ---- file loading ----

#[test]
fn loads_catalog_from_file() {
    let file = write_catalog(
        r#"
        [categories.pool]
        aliases = ["pool/spa", "spa"]
        tiers.minor = { low = 150, high = 450 }
        tiers.major = { low = 4000, high = 15000 }
        subtypes.pump = { low = 600, high = 1800 }

        [categories.roof]
        tiers.moderate = { low = 700, high = 2500 }
        "#,
    );

    let catalog = CostCatalog::from_path(file.path()).unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.categories().collect::<Vec<_>>(), vec!["pool", "roof"]);

    let pump = LookupAttributes::tier(ComplexityTier::Minor).with_subcategory("pump");
    assert_eq!(
        catalog.lookup("Spa", &pump),
        Some(CostRange::new(600.0, 1800.0).unwrap())
    );
    assert_eq!(
        catalog.lookup("roof", &LookupAttributes::tier(ComplexityTier::Moderate)),
        Some(CostRange::new(700.0, 2500.0).unwrap())
    );
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CostCatalog::from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, TableError::Io(_)));
}

#[test]
fn unknown_keys_are_rejected() {
    let file = write_catalog(
        r#"
        [categories.roof]
        tier.minor = { low = 100, high = 200 }
        "#,
    );
    let err = CostCatalog::from_path(file.path()).unwrap_err();
    assert!(matches!(err, TableError::Parse(_)));
}

// ---- trait object use ----

#[test]
fn builtin_is_usable_as_trait_object() {
    let table: Box<dyn ReferenceCostTable> = Box::new(CostCatalog::builtin());
    let attrs = LookupAttributes::tier(ComplexityTier::Major);

    let foundation = table.lookup("Foundation", &attrs).unwrap();
    assert!(foundation.low < foundation.high);
    assert!(table.lookup("swimming pool", &attrs).is_none());
}

#[test]
fn lookup_is_repeatable() {
    let catalog = CostCatalog::builtin();
    let attrs = LookupAttributes::tier(ComplexityTier::Minor).with_subcategory("water heater");
    let first = catalog.lookup("plumbing", &attrs);
    for _ in 0..10 {
        assert_eq!(catalog.lookup("plumbing", &attrs), first);
    }
    assert_eq!(first, Some(CostRange::new(1200.0, 3000.0).unwrap()));
}
