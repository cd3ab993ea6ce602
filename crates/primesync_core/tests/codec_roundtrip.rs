use primesync_core::codec::{decode_bytes, decode_document, encode_to_bytes, Reference};
use primesync_core::{
    Composition, EntityKind, KinModel, Kinetics, PreferredKey, PrimeId, RateExpression,
    RateParameter, Reaction, Source, Species, Stoichiometry, TypedIdentifier,
};

fn id(kind: EntityKind, number: u32) -> PrimeId {
    PrimeId::new(kind, number).unwrap()
}

fn full_species() -> Species {
    let mut species = Species::new(id(EntityKind::Species, 10102), "OH");
    species.copyright = Some("primekinetics.org 2005".into());
    species.content = Some(id(EntityKind::Bibliography, 14319));
    species.preferred_key = PreferredKey {
        value: "OH".into(),
        group: Some("prime".into()),
        key_type: Some("formula".into()),
    };
    species.cas_number = Some("3352-57-6".into());
    species.formula = Some("HO".into());
    species.inchi = Some("InChI=1/HO/h1H".into());
    species.names = vec!["hydroxyl radical".into(), "hydroxyl".into()];
    species.other_identifiers = vec![TypedIdentifier {
        id_type: "SMILES".into(),
        value: "[OH]".into(),
    }];
    species.composition = Composition::from_atoms(["O", "H"]);
    species
}

#[test]
fn species_round_trips_field_for_field() {
    let species = full_species();
    let bytes = encode_to_bytes(&species).unwrap();
    let decoded = decode_bytes::<Species>(&bytes).unwrap();
    assert_eq!(decoded.record, species);
    assert_eq!(
        decoded.references,
        vec![Reference::Source(id(EntityKind::Bibliography, 14319))]
    );
}

#[test]
fn surrounding_whitespace_in_values_round_trips() {
    let mut species = full_species();
    species.names = vec![" hydroxyl ".into(), "hydroxyl radical\n".into()];
    species.copyright = Some(" primekinetics.org ".into());
    let decoded = decode_bytes::<Species>(&encode_to_bytes(&species).unwrap()).unwrap();
    assert_eq!(decoded.record, species);
}

#[test]
fn hydroxyl_composition_is_conserved() {
    let species = full_species();
    let text = String::from_utf8(encode_to_bytes(&species).unwrap()).unwrap();
    assert_eq!(text.matches("<atom ").count(), 2);

    let decoded = decode_bytes::<Species>(text.as_bytes()).unwrap().record;
    assert_eq!(decoded.composition.atom_count(), 2);
    let mut atoms = decoded.composition.atoms();
    atoms.sort_unstable();
    assert_eq!(atoms, vec!["H", "O"]);
}

#[test]
fn reaction_round_trips_with_signed_coefficients() {
    let mut reaction = Reaction::new(id(EntityKind::Reaction, 7));
    reaction.copyright = Some("primekinetics.org 2006".into());
    let mut oh = Stoichiometry::new(id(EntityKind::Species, 10102), -1);
    oh.preferred_key = Some("OH".into());
    reaction.stoichiometry = vec![
        oh,
        Stoichiometry::new(id(EntityKind::Species, 3), -1),
        Stoichiometry::new(id(EntityKind::Species, 4), 2),
    ];

    let decoded = decode_bytes::<Reaction>(&encode_to_bytes(&reaction).unwrap()).unwrap();
    assert_eq!(decoded.record, reaction);
    assert_eq!(decoded.record.reactants().count(), 2);
    assert_eq!(decoded.record.products().count(), 1);
}

#[test]
fn source_round_trips_except_doi() {
    let mut source = Source::new(id(EntityKind::Bibliography, 14319), "Chemical kinetic data base");
    source.authors = vec!["W. Tsang".into(), "R. F. Hampson".into()];
    source.journal = Some("J. Phys. Chem. Ref. Data".into());
    source.year = Some(1986);
    source.volume = Some("15".into());
    source.pages = Some("1087".into());

    let decoded = decode_bytes::<Source>(&encode_to_bytes(&source).unwrap()).unwrap();
    assert_eq!(decoded.record, source);

    source.doi = Some("10.1063/1.555759".into());
    let decoded = decode_bytes::<Source>(&encode_to_bytes(&source).unwrap()).unwrap();
    assert_eq!(decoded.record.doi, None);
}

#[test]
fn kinetics_model_round_trips() {
    let mut model = KinModel::new(id(EntityKind::KineticsModel, 1));
    model.name = Some("GRI-Mech 3.0".into());
    model.kinetics = vec![Kinetics {
        reaction: id(EntityKind::Reaction, 7),
        source: id(EntityKind::Bibliography, 14319),
        rate: RateExpression {
            form: Some("arrhenius".into()),
            parameters: vec![
                RateParameter {
                    name: "A".into(),
                    value: 1.2e13,
                    units: Some("cm3/mol/s".into()),
                },
                RateParameter {
                    name: "n".into(),
                    value: -0.5,
                    units: None,
                },
            ],
        },
        comment: Some("high-pressure limit".into()),
    }];

    let decoded = decode_bytes::<KinModel>(&encode_to_bytes(&model).unwrap()).unwrap();
    assert_eq!(decoded.record, model);
    assert_eq!(decoded.references.len(), 2);
}

#[test]
fn encoded_output_is_stable_and_indented() {
    let species = full_species();
    let first = encode_to_bytes(&species).unwrap();
    let second = encode_to_bytes(&decode_bytes::<Species>(&first).unwrap().record).unwrap();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("\n  <preferredKey"));
    assert!(text.ends_with('\n'));
    let key = text.find("<preferredKey").unwrap();
    let identifiers = text.find("<chemicalIdentifier").unwrap();
    let composition = text.find("<chemicalComposition").unwrap();
    assert!(key < identifiers && identifiers < composition);
}

#[test]
fn decode_document_dispatches_on_root() {
    let species = full_species();
    let document = decode_document(&encode_to_bytes(&species).unwrap()).unwrap();
    assert_eq!(document.kind(), EntityKind::Species);
    assert_eq!(document.prime_id().to_string(), "s00010102");
}
