use async_trait::async_trait;
use serde_json::Value;
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::CredentialStore;
use crate::models::{DeleteResult, Document, Identity, InsertOneResult, UpdateResult, ID_FIELD};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("document encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The five independent document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Products,
    Orders,
    Reviews,
    Blogs,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Products,
        Collection::Orders,
        Collection::Reviews,
        Collection::Blogs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Orders => "orders",
            Collection::Reviews => "reviews",
            Collection::Blogs => "blogs",
        }
    }
}

/// Handle to the document store. Cloning is cheap: every clone shares the
/// same Sled database, so one instance is opened at startup and injected into
/// all request handlers.
///
/// Users are keyed by email, every other collection by the UUID assigned at
/// insert time. Each write touches exactly one key, so Sled's per-key
/// atomicity is the only consistency guarantee; concurrent writers to the
/// same key resolve as last-write-wins.
#[derive(Clone)]
pub struct Storage {
    db: Db,
    users: Tree,
    products: Tree,
    orders: Tree,
    reviews: Tree,
    blogs: Tree,
}

impl Storage {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// Throwaway store that is removed when the last handle drops.
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            users: db.open_tree(Collection::Users.name())?,
            products: db.open_tree(Collection::Products.name())?,
            orders: db.open_tree(Collection::Orders.name())?,
            reviews: db.open_tree(Collection::Reviews.name())?,
            blogs: db.open_tree(Collection::Blogs.name())?,
            db,
        })
    }

    fn tree(&self, collection: Collection) -> &Tree {
        match collection {
            Collection::Users => &self.users,
            Collection::Products => &self.products,
            Collection::Orders => &self.orders,
            Collection::Reviews => &self.reviews,
            Collection::Blogs => &self.blogs,
        }
    }

    /// Flush outstanding writes. Called once on shutdown.
    pub async fn close(&self) -> Result<(), StorageError> {
        let bytes = self.db.flush_async().await?;
        tracing::info!(bytes, "document store flushed");
        Ok(())
    }

    // --- Generic collection access ---

    /// Every document in the collection, in key order (which carries no meaning).
    pub fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StorageError> {
        let mut docs = vec![];
        for item in self.tree(collection).iter() {
            let (_, value) = item?;
            docs.push(serde_json::from_slice(&value)?);
        }
        Ok(docs)
    }

    /// Documents whose top-level `field` equals `value`.
    pub fn find_where(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError> {
        let mut docs = self.find_all(collection)?;
        docs.retain(|doc| doc.get(field) == Some(value));
        Ok(docs)
    }

    pub fn find_by_id(
        &self,
        collection: Collection,
        id: &Uuid,
    ) -> Result<Option<Document>, StorageError> {
        match self.tree(collection).get(id.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Append a document under a freshly generated id, written into `_id`.
    pub fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertOneResult, StorageError> {
        let id = Uuid::new_v4().to_string();
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        self.tree(collection)
            .insert(id.as_bytes(), serde_json::to_vec(&doc)?)?;
        tracing::debug!(collection = collection.name(), %id, "document inserted");
        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    pub fn delete_by_id(
        &self,
        collection: Collection,
        id: &Uuid,
    ) -> Result<DeleteResult, StorageError> {
        let removed = self.tree(collection).remove(id.to_string().as_bytes())?;
        Ok(DeleteResult {
            acknowledged: true,
            deleted_count: u64::from(removed.is_some()),
        })
    }

    /// Set the given top-level fields on the document with this id. Missing
    /// documents are not created.
    pub fn update_by_id(
        &self,
        collection: Collection,
        id: &Uuid,
        fields: &Document,
    ) -> Result<UpdateResult, StorageError> {
        let fields = without(fields, &[ID_FIELD]);
        set_fields(self.tree(collection), &id.to_string(), &fields, None)
    }

    // --- Identities (users keyed by email) ---

    pub fn find_identity_document(&self, email: &str) -> Result<Option<Document>, StorageError> {
        match self.users.get(email.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn find_identity(&self, email: &str) -> Result<Option<Identity>, StorageError> {
        match self.users.get(email.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Merge `fields` into the identity for `email`, creating it if absent.
    /// Applying the same fields twice leaves the store as applying them once.
    pub fn upsert_identity(
        &self,
        email: &str,
        fields: &Document,
    ) -> Result<UpdateResult, StorageError> {
        let mut seed = Document::new();
        seed.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        seed.insert("email".to_string(), Value::String(email.to_string()));
        let fields = without(fields, &[ID_FIELD, "email"]);
        set_fields(&self.users, email, &fields, Some(seed))
    }

    /// Merge `fields` into an existing identity only.
    pub fn update_identity(
        &self,
        email: &str,
        fields: &Document,
    ) -> Result<UpdateResult, StorageError> {
        let fields = without(fields, &[ID_FIELD, "email"]);
        set_fields(&self.users, email, &fields, None)
    }
}

#[async_trait]
impl CredentialStore for Storage {
    async fn identity(&self, email: &str) -> Result<Option<Identity>, StorageError> {
        self.find_identity(email)
    }
}

fn without(fields: &Document, keys: &[&str]) -> Document {
    fields
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Returns true if any field was added or changed.
fn apply_fields(doc: &mut Document, fields: &Document) -> bool {
    let mut changed = false;
    for (k, v) in fields {
        if doc.get(k) != Some(v) {
            doc.insert(k.clone(), v.clone());
            changed = true;
        }
    }
    changed
}

/// `$set`-style update of one key. With `upsert` set, a missing key is created
/// from that seed document before the fields are applied.
fn set_fields(
    tree: &Tree,
    key: &str,
    fields: &Document,
    upsert: Option<Document>,
) -> Result<UpdateResult, StorageError> {
    loop {
        let current = tree.get(key.as_bytes())?;
        let (next, result) = match &current {
            Some(bytes) => {
                let mut doc: Document = serde_json::from_slice(bytes)?;
                if !apply_fields(&mut doc, fields) {
                    return Ok(UpdateResult {
                        matched_count: 1,
                        ..UpdateResult::unmatched()
                    });
                }
                let result = UpdateResult {
                    matched_count: 1,
                    modified_count: 1,
                    ..UpdateResult::unmatched()
                };
                (doc, result)
            }
            None => {
                let Some(mut doc) = upsert.clone() else {
                    return Ok(UpdateResult::unmatched());
                };
                apply_fields(&mut doc, fields);
                let upserted_id = doc
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let result = UpdateResult {
                    upserted_count: 1,
                    upserted_id,
                    ..UpdateResult::unmatched()
                };
                (doc, result)
            }
        };

        let encoded = serde_json::to_vec(&next)?;
        match tree.compare_and_swap(key.as_bytes(), current, Some(encoded))? {
            Ok(()) => return Ok(result),
            // Another writer got in between the read and the swap; re-read.
            Err(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn insert_assigns_id_and_find_by_id_returns_it() {
        let storage = Storage::temporary().expect("Failed to open storage");
        let ack = storage
            .insert_one(Collection::Products, doc(json!({"name": "Roadster", "price": 42000})))
            .expect("Insert failed");
        assert!(ack.acknowledged);

        let id = Uuid::parse_str(&ack.inserted_id).unwrap();
        let found = storage
            .find_by_id(Collection::Products, &id)
            .unwrap()
            .expect("document missing");
        assert_eq!(found.get("name"), Some(&json!("Roadster")));
        assert_eq!(found.get(ID_FIELD), Some(&json!(ack.inserted_id)));

        // Collections are independent.
        assert!(storage.find_by_id(Collection::Orders, &id).unwrap().is_none());
        assert_eq!(storage.find_all(Collection::Products).unwrap().len(), 1);
    }

    #[test]
    fn delete_reports_zero_or_one() {
        let storage = Storage::temporary().unwrap();
        let ack = storage
            .insert_one(Collection::Orders, doc(json!({"item": "tyre"})))
            .unwrap();
        let id = Uuid::parse_str(&ack.inserted_id).unwrap();

        assert_eq!(storage.delete_by_id(Collection::Orders, &id).unwrap().deleted_count, 1);
        assert_eq!(storage.delete_by_id(Collection::Orders, &id).unwrap().deleted_count, 0);
        assert!(storage.find_all(Collection::Orders).unwrap().is_empty());
    }

    #[test]
    fn upsert_identity_is_idempotent() {
        let storage = Storage::temporary().unwrap();
        let fields = doc(json!({"name": "A", "city": "Dhaka"}));

        let first = storage.upsert_identity("a@x.com", &fields).unwrap();
        assert_eq!(first.upserted_count, 1);
        assert!(first.upserted_id.is_some());
        let after_first = storage.find_identity_document("a@x.com").unwrap().unwrap();

        let second = storage.upsert_identity("a@x.com", &fields).unwrap();
        assert_eq!(second.matched_count, 1);
        assert_eq!(second.modified_count, 0);
        assert_eq!(second.upserted_count, 0);
        let after_second = storage.find_identity_document("a@x.com").unwrap().unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(storage.find_all(Collection::Users).unwrap().len(), 1);
    }

    #[test]
    fn upsert_identity_merges_and_pins_key_fields() {
        let storage = Storage::temporary().unwrap();
        storage
            .upsert_identity("a@x.com", &doc(json!({"name": "A"})))
            .unwrap();
        let original_id =
            storage.find_identity_document("a@x.com").unwrap().unwrap()[ID_FIELD].clone();

        let result = storage
            .upsert_identity(
                "a@x.com",
                &doc(json!({"phone": "123", "email": "b@x.com", "_id": "forged"})),
            )
            .unwrap();
        assert_eq!(result.modified_count, 1);

        let stored = storage.find_identity_document("a@x.com").unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&json!("A")));
        assert_eq!(stored.get("phone"), Some(&json!("123")));
        assert_eq!(stored.get("email"), Some(&json!("a@x.com")));
        assert_eq!(stored.get(ID_FIELD), Some(&original_id));
        assert!(storage.find_identity("b@x.com").unwrap().is_none());
    }

    #[test]
    fn update_identity_does_not_create() {
        let storage = Storage::temporary().unwrap();
        let result = storage
            .update_identity("ghost@x.com", &doc(json!({"role": "admin"})))
            .unwrap();
        assert_eq!(result, UpdateResult::unmatched());
        assert!(storage.find_identity("ghost@x.com").unwrap().is_none());
    }

    #[test]
    fn update_by_id_sets_status() {
        let storage = Storage::temporary().unwrap();
        let ack = storage
            .insert_one(Collection::Orders, doc(json!({"status": "pending"})))
            .unwrap();
        let id = Uuid::parse_str(&ack.inserted_id).unwrap();
        let confirm = doc(json!({"status": "confirmed"}));

        let result = storage.update_by_id(Collection::Orders, &id, &confirm).unwrap();
        assert_eq!((result.matched_count, result.modified_count), (1, 1));
        let again = storage.update_by_id(Collection::Orders, &id, &confirm).unwrap();
        assert_eq!((again.matched_count, again.modified_count), (1, 0));

        let order = storage.find_by_id(Collection::Orders, &id).unwrap().unwrap();
        assert_eq!(order.get("status"), Some(&json!("confirmed")));

        let missing = storage
            .update_by_id(Collection::Orders, &Uuid::new_v4(), &confirm)
            .unwrap();
        assert_eq!(missing.matched_count, 0);
    }

    #[test]
    fn find_where_filters_on_field() {
        let storage = Storage::temporary().unwrap();
        storage.insert_one(Collection::Orders, doc(json!({"email": "a@x.com"}))).unwrap();
        storage.insert_one(Collection::Orders, doc(json!({"email": "b@x.com"}))).unwrap();
        storage.insert_one(Collection::Orders, doc(json!({"email": "a@x.com"}))).unwrap();

        let orders = storage
            .find_where(Collection::Orders, "email", &json!("a@x.com"))
            .unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn undecodable_document_is_a_serde_error() {
        let storage = Storage::temporary().unwrap();
        storage.users.insert("bad@x.com", b"not json".to_vec()).unwrap();
        assert!(matches!(
            storage.find_identity("bad@x.com"),
            Err(StorageError::Serde(_))
        ));
        assert!(matches!(
            storage.find_all(Collection::Users),
            Err(StorageError::Serde(_))
        ));
    }
}
