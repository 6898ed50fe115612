use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::merge::MergedExtraction;
use crate::schema::{EntityBlock, PrincipalProfile};

pub const PLACEHOLDER_OPERATOR_NAME: &str = "Unknown Operator";

/// A persisted operator as the store sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub id: Uuid,
    pub name: String,
    pub placeholder: bool,
}

/// Seam to the persistence layer. The pipeline only needs identity lookups
/// and inserts; everything else about operators belongs to the excluded
/// CRUD layer.
pub trait OperatorStore {
    /// Case-insensitive exact match on operator name.
    fn find_by_name(&self, name: &str) -> Option<OperatorRecord>;
    /// The shared placeholder operator, if it has ever been created.
    fn find_placeholder(&self) -> Option<OperatorRecord>;
    fn insert_operator(&mut self, name: &str, placeholder: bool) -> OperatorRecord;
    /// Exact-name principal lookup within one operator.
    fn find_principal(&self, operator_id: Uuid, full_name: &str) -> Option<Uuid>;
    fn insert_principal(&mut self, operator_id: Uuid, principal: &PrincipalProfile) -> Uuid;
}

/// How an operator identity was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    MatchedExisting,
    Created,
    Placeholder,
}

/// Outcome of resolving one merged extraction against the operator store.
/// Either a full operator identity was produced or the shared placeholder
/// was used in its entirety; there is no partial state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub operator_id: Uuid,
    pub operator_name: String,
    pub kind: ResolutionKind,
    /// Set when identity had to degrade to the placeholder, so a human
    /// revisits the record.
    pub needs_review: bool,
    pub principal_ids: Vec<Uuid>,
    /// Additional operators named in the document, linked secondary to the
    /// primary above.
    pub secondary_operator_ids: Vec<Uuid>,
}

/// Resolve extracted entity names onto existing or newly created operator
/// records. Absence of identifying information degrades to a flagged
/// placeholder; resolution never blocks record creation.
pub fn resolve(extraction: &MergedExtraction, store: &mut dyn OperatorStore) -> ResolvedEntity {
    let (primary, kind) = match &extraction.entity {
        Some(entity) => resolve_named(entity, store),
        None => {
            warn!("No operator name extracted; resolving to shared placeholder");
            (resolve_placeholder(store), ResolutionKind::Placeholder)
        }
    };

    let principal_ids = attach_principals(primary.id, &extraction.principals, store);

    let secondary_operator_ids = extraction
        .secondary_entities
        .iter()
        .map(|entity| resolve_named(entity, store).0.id)
        .filter(|id| *id != primary.id)
        .collect();

    ResolvedEntity {
        operator_id: primary.id,
        operator_name: primary.name,
        needs_review: kind == ResolutionKind::Placeholder,
        kind,
        principal_ids,
        secondary_operator_ids,
    }
}

fn resolve_named(entity: &EntityBlock, store: &mut dyn OperatorStore) -> (OperatorRecord, ResolutionKind) {
    match store.find_by_name(&entity.name) {
        Some(existing) => {
            info!("Matched operator '{}' to existing record {}", entity.name, existing.id);
            (existing, ResolutionKind::MatchedExisting)
        }
        None => {
            let created = store.insert_operator(&entity.name, false);
            info!("Created operator '{}' as {}", created.name, created.id);
            (created, ResolutionKind::Created)
        }
    }
}

fn resolve_placeholder(store: &mut dyn OperatorStore) -> OperatorRecord {
    match store.find_placeholder() {
        Some(existing) => existing,
        None => store.insert_operator(PLACEHOLDER_OPERATOR_NAME, true),
    }
}

fn attach_principals(
    operator_id: Uuid,
    principals: &[PrincipalProfile],
    store: &mut dyn OperatorStore,
) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for principal in principals {
        let full_name = principal.full_name.trim();
        if full_name.is_empty() {
            continue;
        }
        let id = match store.find_principal(operator_id, full_name) {
            Some(existing) => existing,
            None => store.insert_principal(operator_id, principal),
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Reference in-memory store, also the fixture the test suite runs against.
#[derive(Debug, Default)]
pub struct InMemoryOperatorStore {
    operators: Vec<OperatorRecord>,
    principals: Vec<(Uuid, String, Uuid)>,
}

impl InMemoryOperatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    pub fn principal_count(&self) -> usize {
        self.principals.len()
    }
}

impl OperatorStore for InMemoryOperatorStore {
    fn find_by_name(&self, name: &str) -> Option<OperatorRecord> {
        self.operators
            .iter()
            .find(|record| record.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn find_placeholder(&self) -> Option<OperatorRecord> {
        self.operators.iter().find(|record| record.placeholder).cloned()
    }

    fn insert_operator(&mut self, name: &str, placeholder: bool) -> OperatorRecord {
        let record = OperatorRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            placeholder,
        };
        self.operators.push(record.clone());
        record
    }

    fn find_principal(&self, operator_id: Uuid, full_name: &str) -> Option<Uuid> {
        self.principals
            .iter()
            .find(|(op, name, _)| *op == operator_id && name == full_name)
            .map(|(_, _, id)| *id)
    }

    fn insert_principal(&mut self, operator_id: Uuid, principal: &PrincipalProfile) -> Uuid {
        let id = Uuid::new_v4();
        self.principals
            .push((operator_id, principal.full_name.trim().to_string(), id));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergedExtraction, SourceTag};
    use crate::schema::{Classification, FinancialMetrics};

    fn entity(name: &str) -> EntityBlock {
        EntityBlock {
            name: name.to_string(),
            legal_name: None,
            website_url: None,
            hq_city: None,
            hq_state: None,
            hq_country: None,
            primary_geography_focus: None,
            primary_asset_type_focus: None,
            description: None,
        }
    }

    fn principal(name: &str) -> PrincipalProfile {
        PrincipalProfile {
            full_name: name.to_string(),
            headline: None,
            linkedin_url: None,
            email: None,
            phone: None,
            background_summary: None,
            years_experience: None,
        }
    }

    fn merged(entity_block: Option<EntityBlock>) -> MergedExtraction {
        MergedExtraction {
            entity: entity_block,
            secondary_entities: Vec::new(),
            narrative: None,
            principals: Vec::new(),
            financials: FinancialMetrics::new(),
            classification: Classification::Deal,
            entity_source: SourceTag::Narrative,
            financial_source: SourceTag::NarrativeOnly,
        }
    }

    #[test]
    fn test_resolving_same_name_twice_is_idempotent() {
        let mut store = InMemoryOperatorStore::new();
        let extraction = merged(Some(entity("Crestline Partners")));

        let first = resolve(&extraction, &mut store);
        let second = resolve(&extraction, &mut store);

        assert_eq!(first.kind, ResolutionKind::Created);
        assert_eq!(second.kind, ResolutionKind::MatchedExisting);
        assert_eq!(first.operator_id, second.operator_id);
        assert_eq!(store.operator_count(), 1);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let mut store = InMemoryOperatorStore::new();
        resolve(&merged(Some(entity("Crestline Partners"))), &mut store);
        let again = resolve(&merged(Some(entity("CRESTLINE PARTNERS"))), &mut store);
        assert_eq!(again.kind, ResolutionKind::MatchedExisting);
        assert_eq!(store.operator_count(), 1);
    }

    #[test]
    fn test_null_entity_shares_one_placeholder_and_flags_review() {
        let mut store = InMemoryOperatorStore::new();

        let first = resolve(&merged(None), &mut store);
        let second = resolve(&merged(None), &mut store);

        assert_eq!(first.operator_id, second.operator_id);
        assert_eq!(first.operator_name, PLACEHOLDER_OPERATOR_NAME);
        assert!(first.needs_review);
        assert!(second.needs_review);
        assert_eq!(store.operator_count(), 1);
    }

    #[test]
    fn test_principals_deduplicated_within_operator() {
        let mut store = InMemoryOperatorStore::new();
        let mut extraction = merged(Some(entity("Crestline Partners")));
        extraction.principals = vec![principal("John Smith"), principal("John Smith"), principal("Ana Ruiz")];

        let resolved = resolve(&extraction, &mut store);

        assert_eq!(resolved.principal_ids.len(), 2);
        assert_eq!(store.principal_count(), 2);
    }

    #[test]
    fn test_principals_attach_to_placeholder_when_unnamed() {
        let mut store = InMemoryOperatorStore::new();
        let mut extraction = merged(None);
        extraction.principals = vec![principal("John Smith")];

        let resolved = resolve(&extraction, &mut store);

        assert_eq!(resolved.kind, ResolutionKind::Placeholder);
        assert_eq!(resolved.principal_ids.len(), 1);
        assert_eq!(
            store.find_principal(resolved.operator_id, "John Smith"),
            Some(resolved.principal_ids[0])
        );
    }

    #[test]
    fn test_multiple_operators_first_primary_rest_secondary() {
        let mut store = InMemoryOperatorStore::new();
        let mut extraction = merged(Some(entity("Crestline Partners")));
        extraction.secondary_entities = vec![entity("Oak Capital"), entity("Crestline Partners")];

        let resolved = resolve(&extraction, &mut store);

        assert_eq!(resolved.operator_name, "Crestline Partners");
        // The duplicate of the primary is not linked twice.
        assert_eq!(resolved.secondary_operator_ids.len(), 1);
        assert_eq!(store.operator_count(), 2);
    }
}
