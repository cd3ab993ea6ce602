#![allow(dead_code)]

use rusqlite::Connection;

const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
const NS: &str =
    r#"xmlns="http://purl.org/NET/prime/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#;

pub fn bibliography_xml(id: &str, authors: &[&str], title: &str) -> String {
    let authors: String = authors
        .iter()
        .map(|name| format!("  <author>{name}</author>\n"))
        .collect();
    format!(
        "{HEADER}\n<bibliography {NS} primeID=\"{id}\" xsi:schemaLocation=\"http://warehouse.primekinetics.org/schema/bibliography.xsd\">\n{authors}  <title>{title}</title>\n  <journal>Combust. Flame</journal>\n  <year>1999</year>\n</bibliography>\n"
    )
}

pub fn species_xml(id: &str, key: &str, atoms: &[(&str, u32)]) -> String {
    species_with_content_xml(id, key, None, atoms)
}

/// Species document whose `<content>` cites `source` when given.
pub fn species_with_content_xml(
    id: &str,
    key: &str,
    source: Option<&str>,
    atoms: &[(&str, u32)],
) -> String {
    let content = source
        .map(|source| format!("  <content bibliography=\"{source}\"/>\n"))
        .unwrap_or_default();
    let atoms: String = atoms
        .iter()
        .map(|(symbol, count)| format!("    <atom symbol=\"{symbol}\">{count}</atom>\n"))
        .collect();
    format!(
        "{HEADER}\n<chemicalSpecies {NS} primeID=\"{id}\">\n{content}  <preferredKey group=\"prime\">{key}</preferredKey>\n  <chemicalIdentifier>\n    <name>{key}</name>\n  </chemicalIdentifier>\n  <chemicalComposition>\n{atoms}  </chemicalComposition>\n</chemicalSpecies>\n"
    )
}

pub fn reaction_xml(id: &str, links: &[(&str, i32)]) -> String {
    let links: Vec<(&str, Option<&str>, i32)> = links
        .iter()
        .map(|(species, coefficient)| (*species, None, *coefficient))
        .collect();
    keyed_reaction_xml(id, &links)
}

/// Reaction document with an optional `preferredKey` on each link.
pub fn keyed_reaction_xml(id: &str, links: &[(&str, Option<&str>, i32)]) -> String {
    let links: String = links
        .iter()
        .map(|(species, key, coefficient)| {
            let key = key
                .map(|key| format!(" preferredKey=\"{key}\""))
                .unwrap_or_default();
            format!("    <speciesLink primeID=\"{species}\"{key}>{coefficient}</speciesLink>\n")
        })
        .collect();
    format!(
        "{HEADER}\n<reaction {NS} primeID=\"{id}\">\n  <reactants>\n{links}  </reactants>\n</reaction>\n"
    )
}

pub fn model_xml(id: &str, name: &str, entries: &[(&str, &str, f64)]) -> String {
    let entries: String = entries
        .iter()
        .map(|(reaction, source, a)| {
            format!(
                "  <kinetics reactionPrimeID=\"{reaction}\" bibliography=\"{source}\">\n    <rateExpression form=\"arrhenius\">\n      <parameter name=\"A\" units=\"cm3/mol/s\">{a}</parameter>\n    </rateExpression>\n  </kinetics>\n"
            )
        })
        .collect();
    format!("{HEADER}\n<kineticsModel {NS} primeID=\"{id}\">\n  <name>{name}</name>\n{entries}</kineticsModel>\n")
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

/// `(author name, ord)` for one source, in order.
pub fn authorships(conn: &Connection, prime_id: &str) -> Vec<(String, i64)> {
    let mut stmt = conn
        .prepare(
            "SELECT a.name, s.ord
             FROM authorships s
             INNER JOIN authors a ON a.id = s.author_id
             INNER JOIN sources src ON src.id = s.source_id
             WHERE src.prime_id = ?1
             ORDER BY s.ord;",
        )
        .unwrap();
    stmt.query_map([prime_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
