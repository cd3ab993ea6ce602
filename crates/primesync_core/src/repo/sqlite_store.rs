//! SQLite implementation of `EntityStore`.
//!
//! # Invariants
//! - Writes require an open transaction on the wrapped connection.
//! - Child collections are replaced wholesale on every upsert.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::ids::{EntityKind, PrimeId};
use crate::model::kinetics::{KinModel, Kinetics, RateExpression, RateParameter};
use crate::model::reaction::{Reaction, Stoichiometry};
use crate::model::source::{normalize_author_name, Source};
use crate::model::species::{Composition, PreferredKey, Species, TypedIdentifier};
use crate::model::RecordValidationError;
use crate::registry::{
    entity_table, observe_in, resolve_in, IdentifierRegistry, RowKey, SqliteIdentifierRegistry,
};
use crate::repo::entity_repo::{EntityStore, KineticsLink, RepoError, RepoResult, Upserted};
use rusqlite::{params, Connection, OptionalExtension, Params};

const NOW_MS: &str = "(strftime('%s', 'now') * 1000)";

/// Store bound to one connection (normally an open transaction).
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
    registry: SqliteIdentifierRegistry<'conn>,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            registry: SqliteIdentifierRegistry::new(conn),
        }
    }

    fn ensure_writable(&self) -> RepoResult<()> {
        if self.conn.is_autocommit() {
            return Err(RepoError::TransactionRequired);
        }
        Ok(())
    }

    /// Runs an `INSERT ... ON CONFLICT(prime_id) DO UPDATE ... RETURNING id`.
    fn upsert_keyed<P: Params>(&self, id: &PrimeId, sql: &str, params: P) -> RepoResult<Upserted> {
        self.ensure_writable()?;
        let existed = resolve_in(self.conn, id)?.is_some();
        let key: RowKey = self.conn.query_row(sql, params, |row| row.get(0))?;
        observe_in(self.conn, id)?;
        Ok(Upserted {
            key,
            was_created: !existed,
        })
    }
}

impl EntityStore for SqliteStore<'_> {
    fn registry(&self) -> &dyn IdentifierRegistry {
        &self.registry
    }

    fn upsert_author(&self, name: &str) -> RepoResult<Upserted> {
        self.ensure_writable()?;
        let normalized = normalize_author_name(name);
        if normalized.is_empty() {
            return Err(RecordValidationError::new("author", "must not be blank").into());
        }

        let inserted = self.conn.execute(
            "INSERT INTO authors (name) VALUES (?1) ON CONFLICT(name) DO NOTHING;",
            [normalized.as_str()],
        )?;
        let key: RowKey = self.conn.query_row(
            "SELECT id FROM authors WHERE name = ?1;",
            [normalized.as_str()],
            |row| row.get(0),
        )?;
        Ok(Upserted {
            key,
            was_created: inserted == 1,
        })
    }

    fn upsert_source(&self, source: &Source) -> RepoResult<Upserted> {
        source.validate()?;
        self.upsert_keyed(
            &source.prime_id,
            &format!(
                "INSERT INTO sources (prime_id, title, journal, pub_year, volume, pages, doi)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(prime_id) DO UPDATE SET
                    title = excluded.title,
                    journal = excluded.journal,
                    pub_year = excluded.pub_year,
                    volume = excluded.volume,
                    pages = excluded.pages,
                    doi = COALESCE(excluded.doi, sources.doi),
                    updated_at = {NOW_MS}
                 RETURNING id;"
            ),
            params![
                source.prime_id.to_string(),
                source.title.as_str(),
                source.journal.as_deref(),
                source.year,
                source.volume.as_deref(),
                source.pages.as_deref(),
                source.doi.as_deref(),
            ],
        )
    }

    fn replace_authorships(&self, source: RowKey, authors: &[RowKey]) -> RepoResult<()> {
        self.ensure_writable()?;
        self.conn
            .execute("DELETE FROM authorships WHERE source_id = ?1;", [source])?;
        let mut insert = self.conn.prepare_cached(
            "INSERT INTO authorships (source_id, author_id, ord) VALUES (?1, ?2, ?3);",
        )?;
        for (author, ord) in authors.iter().zip(1_i64..) {
            insert.execute(params![source, author, ord])?;
        }
        Ok(())
    }

    fn upsert_species(&self, species: &Species, source: Option<RowKey>) -> RepoResult<Upserted> {
        species.validate()?;
        if species.content.is_some() != source.is_some() {
            return Err(RepoError::InvalidData(format!(
                "species {} content link and source key disagree",
                species.prime_id
            )));
        }
        let upserted = self.upsert_keyed(
            &species.prime_id,
            &format!(
                "INSERT INTO species (
                    prime_id, copyright, preferred_key, preferred_key_group,
                    preferred_key_type, cas_number, formula, inchi, source_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(prime_id) DO UPDATE SET
                    copyright = excluded.copyright,
                    preferred_key = excluded.preferred_key,
                    preferred_key_group = excluded.preferred_key_group,
                    preferred_key_type = excluded.preferred_key_type,
                    cas_number = excluded.cas_number,
                    formula = excluded.formula,
                    inchi = excluded.inchi,
                    source_id = excluded.source_id,
                    updated_at = {NOW_MS}
                 RETURNING id;"
            ),
            params![
                species.prime_id.to_string(),
                species.copyright.as_deref(),
                species.preferred_key.value.as_str(),
                species.preferred_key.group.as_deref(),
                species.preferred_key.key_type.as_deref(),
                species.cas_number.as_deref(),
                species.formula.as_deref(),
                species.inchi.as_deref(),
                source,
            ],
        )?;
        let key = upserted.key;

        for table in ["species_names", "species_identifiers", "species_composition"] {
            self.conn.execute(
                &format!("DELETE FROM {table} WHERE species_id = ?1;"),
                [key],
            )?;
        }

        let mut insert_name = self
            .conn
            .prepare_cached("INSERT INTO species_names (species_id, ord, name) VALUES (?1, ?2, ?3);")?;
        for (name, ord) in species.names.iter().zip(1_i64..) {
            insert_name.execute(params![key, ord, name.as_str()])?;
        }

        let mut insert_identifier = self.conn.prepare_cached(
            "INSERT INTO species_identifiers (species_id, ord, id_type, value)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for (identifier, ord) in species.other_identifiers.iter().zip(1_i64..) {
            insert_identifier.execute(params![
                key,
                ord,
                identifier.id_type.as_str(),
                identifier.value.as_str()
            ])?;
        }

        let mut insert_atom = self.conn.prepare_cached(
            "INSERT INTO species_composition (species_id, symbol, count) VALUES (?1, ?2, ?3);",
        )?;
        for (symbol, count) in species.composition.iter() {
            insert_atom.execute(params![key, symbol, i64::from(count)])?;
        }

        Ok(upserted)
    }

    fn upsert_reaction(&self, reaction: &Reaction, species: &[RowKey]) -> RepoResult<Upserted> {
        reaction.validate()?;
        if species.len() != reaction.stoichiometry.len() {
            return Err(RepoError::InvalidData(format!(
                "reaction {} has {} stoichiometry entries but {} species keys",
                reaction.prime_id,
                reaction.stoichiometry.len(),
                species.len()
            )));
        }

        let upserted = self.upsert_keyed(
            &reaction.prime_id,
            &format!(
                "INSERT INTO reactions (prime_id, copyright) VALUES (?1, ?2)
                 ON CONFLICT(prime_id) DO UPDATE SET
                    copyright = excluded.copyright,
                    updated_at = {NOW_MS}
                 RETURNING id;"
            ),
            params![reaction.prime_id.to_string(), reaction.copyright.as_deref()],
        )?;

        self.conn.execute(
            "DELETE FROM stoichiometries WHERE reaction_id = ?1;",
            [upserted.key],
        )?;
        let mut insert = self.conn.prepare_cached(
            "INSERT INTO stoichiometries (reaction_id, ord, species_id, preferred_key, coefficient)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        for ((entry, species_key), ord) in reaction.stoichiometry.iter().zip(species).zip(1_i64..) {
            insert.execute(params![
                upserted.key,
                ord,
                species_key,
                entry.preferred_key.as_deref(),
                entry.coefficient
            ])?;
        }

        Ok(upserted)
    }

    fn upsert_kin_model(&self, model: &KinModel, links: &[KineticsLink]) -> RepoResult<Upserted> {
        model.validate()?;
        if links.len() != model.kinetics.len() {
            return Err(RepoError::InvalidData(format!(
                "model {} has {} kinetics entries but {} links",
                model.prime_id,
                model.kinetics.len(),
                links.len()
            )));
        }

        let upserted = self.upsert_keyed(
            &model.prime_id,
            &format!(
                "INSERT INTO kin_models (prime_id, name) VALUES (?1, ?2)
                 ON CONFLICT(prime_id) DO UPDATE SET
                    name = excluded.name,
                    updated_at = {NOW_MS}
                 RETURNING id;"
            ),
            params![model.prime_id.to_string(), model.name.as_deref()],
        )?;

        // Parameters go with their kinetics row through ON DELETE CASCADE.
        self.conn
            .execute("DELETE FROM kinetics WHERE model_id = ?1;", [upserted.key])?;
        let mut insert_parameter = self.conn.prepare_cached(
            "INSERT INTO kinetics_parameters (kinetics_id, ord, name, value, units)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        for ((entry, link), ord) in model.kinetics.iter().zip(links).zip(1_i64..) {
            let kinetics_key: RowKey = self.conn.query_row(
                "INSERT INTO kinetics (model_id, ord, reaction_id, source_id, rate_form, comment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id;",
                params![
                    upserted.key,
                    ord,
                    link.reaction,
                    link.source,
                    entry.rate.form.as_deref(),
                    entry.comment.as_deref(),
                ],
                |row| row.get(0),
            )?;
            for (parameter, parameter_ord) in entry.rate.parameters.iter().zip(1_i64..) {
                insert_parameter.execute(params![
                    kinetics_key,
                    parameter_ord,
                    parameter.name.as_str(),
                    parameter.value,
                    parameter.units.as_deref(),
                ])?;
            }
        }

        Ok(upserted)
    }

    fn find_source(&self, id: &PrimeId) -> RepoResult<Option<Source>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, journal, pub_year, volume, pages, doi
                 FROM sources
                 WHERE prime_id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, RowKey>("id")?,
                        Source {
                            prime_id: *id,
                            title: row.get("title")?,
                            journal: row.get("journal")?,
                            year: row.get("pub_year")?,
                            volume: row.get("volume")?,
                            pages: row.get("pages")?,
                            doi: row.get("doi")?,
                            authors: Vec::new(),
                        },
                    ))
                },
            )
            .optional()?;
        let Some((key, mut source)) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT s.ord, a.name
             FROM authorships s
             INNER JOIN authors a ON a.id = s.author_id
             WHERE s.source_id = ?1
             ORDER BY s.ord ASC;",
        )?;
        let mut rows = stmt.query([key])?;
        while let Some(row) = rows.next()? {
            let ord: i64 = row.get(0)?;
            let expected = i64::try_from(source.authors.len()).unwrap_or(i64::MAX) + 1;
            if ord != expected {
                return Err(RepoError::InvalidData(format!(
                    "authorship order for {id} jumps to {ord}, expected {expected}"
                )));
            }
            source.authors.push(row.get(1)?);
        }
        Ok(Some(source))
    }

    fn find_species(&self, id: &PrimeId) -> RepoResult<Option<Species>> {
        let row = self
            .conn
            .query_row(
                "SELECT species.id AS id, copyright, preferred_key, preferred_key_group,
                        preferred_key_type, cas_number, formula, inchi,
                        src.prime_id AS content
                 FROM species
                 LEFT JOIN sources src ON src.id = species.source_id
                 WHERE species.prime_id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, RowKey>("id")?,
                        row.get::<_, Option<String>>("content")?,
                        Species {
                            prime_id: *id,
                            copyright: row.get("copyright")?,
                            content: None,
                            preferred_key: PreferredKey {
                                value: row.get("preferred_key")?,
                                group: row.get("preferred_key_group")?,
                                key_type: row.get("preferred_key_type")?,
                            },
                            cas_number: row.get("cas_number")?,
                            formula: row.get("formula")?,
                            inchi: row.get("inchi")?,
                            names: Vec::new(),
                            other_identifiers: Vec::new(),
                            composition: Composition::new(),
                        },
                    ))
                },
            )
            .optional()?;
        let Some((key, content, mut species)) = row else {
            return Ok(None);
        };
        species.content = content
            .map(|text| parse_stored_id(EntityKind::Bibliography, &text))
            .transpose()?;

        let mut names = self
            .conn
            .prepare_cached("SELECT name FROM species_names WHERE species_id = ?1 ORDER BY ord;")?;
        species.names = names
            .query_map([key], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut identifiers = self.conn.prepare_cached(
            "SELECT id_type, value FROM species_identifiers WHERE species_id = ?1 ORDER BY ord;",
        )?;
        species.other_identifiers = identifiers
            .query_map([key], |row| {
                Ok(TypedIdentifier {
                    id_type: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut atoms = self
            .conn
            .prepare_cached("SELECT symbol, count FROM species_composition WHERE species_id = ?1;")?;
        let mut rows = atoms.query([key])?;
        while let Some(row) = rows.next()? {
            let symbol: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let count = u32::try_from(count).map_err(|_| {
                RepoError::InvalidData(format!("invalid atom count `{count}` for {symbol} in {id}"))
            })?;
            species.composition.add(symbol, count);
        }
        species
            .composition
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("{id}: {err}")))?;

        Ok(Some(species))
    }

    fn find_reaction(&self, id: &PrimeId) -> RepoResult<Option<Reaction>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, copyright FROM reactions WHERE prime_id = ?1;",
                [id.to_string()],
                |row| Ok((row.get::<_, RowKey>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((key, copyright)) = row else {
            return Ok(None);
        };

        let mut reaction = Reaction::new(*id);
        reaction.copyright = copyright;
        let mut stmt = self.conn.prepare_cached(
            "SELECT sp.prime_id, st.preferred_key, st.coefficient
             FROM stoichiometries st
             INNER JOIN species sp ON sp.id = st.species_id
             WHERE st.reaction_id = ?1
             ORDER BY st.ord ASC;",
        )?;
        let mut rows = stmt.query([key])?;
        while let Some(row) = rows.next()? {
            let species_text: String = row.get(0)?;
            reaction.stoichiometry.push(Stoichiometry {
                species: parse_stored_id(EntityKind::Species, &species_text)?,
                // The key the document carried for this link, not the species row's.
                preferred_key: row.get(1)?,
                coefficient: row.get(2)?,
            });
        }
        Ok(Some(reaction))
    }

    fn find_kin_model(&self, id: &PrimeId) -> RepoResult<Option<KinModel>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name FROM kin_models WHERE prime_id = ?1;",
                [id.to_string()],
                |row| Ok((row.get::<_, RowKey>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((key, name)) = row else {
            return Ok(None);
        };

        let mut model = KinModel::new(*id);
        model.name = name;

        let mut entries = self.conn.prepare_cached(
            "SELECT k.id, r.prime_id, s.prime_id, k.rate_form, k.comment
             FROM kinetics k
             INNER JOIN reactions r ON r.id = k.reaction_id
             INNER JOIN sources s ON s.id = k.source_id
             WHERE k.model_id = ?1
             ORDER BY k.ord ASC;",
        )?;
        let mut parameters = self.conn.prepare_cached(
            "SELECT name, value, units
             FROM kinetics_parameters
             WHERE kinetics_id = ?1
             ORDER BY ord ASC;",
        )?;

        let mut rows = entries.query([key])?;
        while let Some(row) = rows.next()? {
            let kinetics_key: RowKey = row.get(0)?;
            let reaction_text: String = row.get(1)?;
            let source_text: String = row.get(2)?;
            let rate_parameters = parameters
                .query_map([kinetics_key], |param| {
                    Ok(RateParameter {
                        name: param.get(0)?,
                        value: param.get(1)?,
                        units: param.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            model.kinetics.push(Kinetics {
                reaction: parse_stored_id(EntityKind::Reaction, &reaction_text)?,
                source: parse_stored_id(EntityKind::Bibliography, &source_text)?,
                rate: RateExpression {
                    form: row.get(3)?,
                    parameters: rate_parameters,
                },
                comment: row.get(4)?,
            });
        }
        Ok(Some(model))
    }

    fn list_prime_ids(&self, kind: EntityKind) -> RepoResult<Vec<PrimeId>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT prime_id FROM {} ORDER BY prime_id ASC;",
            entity_table(kind)
        ))?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_stored_id(kind, &text)?);
        }
        Ok(ids)
    }
}

fn parse_stored_id(kind: EntityKind, value: &str) -> RepoResult<PrimeId> {
    PrimeId::parse(kind, value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid {kind} identifier `{value}` in {}.prime_id",
            entity_table(kind)
        ))
    })
}
