//! Domain models used across the integration tests.
//!
//! [`DatasetAssociation`] is the audited, versioned entity: it sits in a
//! history under a sequence number and points at a dataset with a size
//! and a state. Each version it produces is a [`DatasetVersion`] row
//! added to the flushing session. [`Note`] is an ordinary entity with no
//! version history.

use modelmap_core::{
    encode_cbor, AuditedEntity, CoreResult, CreatesVersionRecord, Entity, EntityId, EntityRef,
    ModelModule, ModelType, Session,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dataset states in which no data file is expected yet, or ever.
pub const NO_DATA_STATES: &[&str] = &[
    "new",
    "upload",
    "queued",
    "running",
    "setting_metadata",
    "paused",
    "deferred",
    "discarded",
];

/// A dataset placed in a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetAssociation {
    /// Identity.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Datatype extension.
    pub extension: String,
    /// Loaded history reference.
    pub history: Option<EntityId>,
    /// History foreign key.
    pub history_id: Option<i64>,
    /// Sequence number within the history.
    pub hid: Option<u64>,
    /// Size of the dataset file, once known.
    pub file_size: Option<u64>,
    /// Dataset state.
    pub state: String,
    /// Incremented by every modification.
    pub version: u32,
}

impl DatasetAssociation {
    /// A dataset that passes every strict check.
    #[must_use]
    pub fn valid(name: &str) -> Self {
        Self {
            id: EntityId::new(),
            name: name.to_string(),
            extension: "txt".to_string(),
            history: Some(EntityId::new()),
            history_id: Some(1),
            hid: Some(1),
            file_size: Some(0),
            state: "ok".to_string(),
            version: 1,
        }
    }

    /// A custom build: `len` extension, no history, no sequence number.
    #[must_use]
    pub fn custom_build(name: &str) -> Self {
        Self {
            extension: modelmap_core::EXEMPT_EXTENSION.to_string(),
            history: None,
            history_id: None,
            hid: None,
            file_size: None,
            ..Self::valid(name)
        }
    }

    /// Removes both history links.
    #[must_use]
    pub fn without_history(mut self) -> Self {
        self.history = None;
        self.history_id = None;
        self
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn with_hid(mut self, hid: Option<u64>) -> Self {
        self.hid = hid;
        self
    }

    /// Sets the file size and state.
    #[must_use]
    pub fn with_data(mut self, file_size: Option<u64>, state: &str) -> Self {
        self.file_size = file_size;
        self.state = state.to_string();
        self
    }

    /// The modified snapshot after a rename.
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Wraps the snapshot for a session.
    #[must_use]
    pub fn into_ref(self) -> EntityRef {
        Arc::new(self)
    }
}

impl Entity for DatasetAssociation {
    fn kind(&self) -> &'static str {
        "DatasetAssociation"
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        encode_cbor(self)
    }

    fn as_versioned(&self) -> Option<&dyn CreatesVersionRecord> {
        Some(self)
    }

    fn as_audited(&self) -> Option<&dyn AuditedEntity> {
        Some(self)
    }
}

impl CreatesVersionRecord for DatasetAssociation {
    fn create_version(&self, session: &Session, deleted: bool) -> CoreResult<()> {
        session.add(Arc::new(DatasetVersion {
            id: EntityId::new(),
            dataset: self.id,
            version: self.version,
            name: self.name.clone(),
            deleted,
        }))
    }
}

impl AuditedEntity for DatasetAssociation {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn parent_ref(&self) -> Option<EntityId> {
        self.history
    }

    fn parent_id(&self) -> Option<i64> {
        self.history_id
    }

    fn sequence_number(&self) -> Option<u64> {
        self.hid
    }

    fn data_size(&self) -> Option<u64> {
        self.file_size
    }

    fn data_state(&self) -> &str {
        &self.state
    }

    fn no_data_states(&self) -> &'static [&'static str] {
        NO_DATA_STATES
    }
}

/// One entry of a dataset's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    /// Identity.
    pub id: EntityId,
    /// The versioned dataset.
    pub dataset: EntityId,
    /// Dataset version captured.
    pub version: u32,
    /// Dataset name at that version.
    pub name: String,
    /// Whether the dataset was being deleted.
    pub deleted: bool,
}

impl Entity for DatasetVersion {
    fn kind(&self) -> &'static str {
        "DatasetVersion"
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        encode_cbor(self)
    }
}

/// Free-form annotation without version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identity.
    pub id: EntityId,
    /// Text.
    pub text: String,
}

impl Note {
    /// Creates a note.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            id: EntityId::new(),
            text: text.to_string(),
        }
    }
}

impl Entity for Note {
    fn kind(&self) -> &'static str {
        "Note"
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        encode_cbor(self)
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity.
    pub id: EntityId,
    /// Login address.
    pub email: String,
}

impl Entity for User {
    fn kind(&self) -> &'static str {
        "User"
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        encode_cbor(self)
    }
}

/// A browser session of a user.
#[derive(Debug, Clone)]
pub struct UserSession {
    /// Owning user.
    pub user: EntityId,
}

/// An API key of a user.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    /// Owning user.
    pub user: EntityId,
}

/// A pending password reset.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    /// Owning user.
    pub user: EntityId,
}

/// Module declaring the account models.
#[must_use]
pub fn accounts_module() -> ModelModule {
    ModelModule::new("accounts")
        .declare::<User>("User")
        .declare::<UserSession>("UserSession")
        .declare::<ApiKeys>("ApiKeys")
        .declare::<PasswordResetToken>("PasswordResetToken")
}

/// Module declaring the dataset models; re-exports `User`.
#[must_use]
pub fn datasets_module() -> ModelModule {
    ModelModule::new("datasets")
        .declare::<DatasetAssociation>("DatasetAssociation")
        .declare::<DatasetVersion>("DatasetVersion")
        .declare::<Note>("Note")
        .reexport(ModelType::of::<User>("User", "accounts"))
}

/// Every module, in registration order.
#[must_use]
pub fn all_modules() -> Vec<ModelModule> {
    vec![accounts_module(), datasets_module()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelmap_core::{check_integrity, EXEMPT_EXTENSION};
    use proptest::prelude::*;

    #[test]
    fn fixtures_match_their_intent() {
        assert!(check_integrity("valid", &DatasetAssociation::valid("a")).is_ok());
        assert!(check_integrity("custom", &DatasetAssociation::custom_build("b")).is_ok());
        assert!(
            check_integrity("orphan", &DatasetAssociation::valid("c").without_history()).is_err()
        );
    }

    proptest! {
        #[test]
        fn strict_check_follows_the_field_rules(
            in_history in any::<bool>(),
            hid in proptest::option::of(0u64..3),
            size in proptest::option::of(0u64..10),
            state in proptest::sample::select(vec!["ok", "error", "discarded", "queued"]),
            exempt in any::<bool>(),
        ) {
            let mut dataset = DatasetAssociation::valid("p").with_hid(hid).with_data(size, state);
            if !in_history {
                dataset = dataset.without_history();
            }
            if exempt {
                dataset.extension = EXEMPT_EXTENSION.to_string();
            }

            let expected = exempt
                || (in_history
                    && hid.unwrap_or(0) != 0
                    && (size.is_some() || NO_DATA_STATES.contains(&state)));
            prop_assert_eq!(check_integrity("p", &dataset).is_ok(), expected);
        }
    }

    #[test]
    fn rename_bumps_version_and_keeps_identity() {
        let original = DatasetAssociation::valid("a");
        let renamed = original.renamed("b");
        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.version, 2);
        assert_eq!(renamed.key(), original.key());
    }
}
