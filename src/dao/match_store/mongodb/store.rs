use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, doc_id, status_literal, uuid_as_binary},
};
use crate::dao::{
    match_store::{ClaimOutcome, MatchStore, UpdateOutcome},
    models::{MatchEntity, MatchStatus, MatchUpdate},
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "matches";

#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        // find_oldest_waiting scans by status and sorts by creation time.
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("waiting_queue_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "status,created_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn create(&self, entity: MatchEntity) -> MongoResult<()> {
        let id = entity.id;
        let document: MongoMatchDocument = entity.into();
        self.collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::CreateMatch { id, source })?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn update(&self, id: Uuid, update: MatchUpdate) -> MongoResult<UpdateOutcome> {
        let mut filter = doc_id(id);
        let mut set = doc! { "updated_at": DateTime::now() };

        if let Some(next) = update.status {
            // Restrict the filter to statuses that may legally move to `next`,
            // so the conditional write itself enforces the monotonic graph.
            let sources: Vec<&str> = [
                MatchStatus::Creating,
                MatchStatus::Waiting,
                MatchStatus::Active,
                MatchStatus::Failed,
                MatchStatus::Finished,
            ]
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .map(status_literal)
            .collect();
            filter.insert("status", doc! { "$in": sources });
            set.insert("status", status_literal(next));
        }
        if let Some(challenge_id) = update.challenge_id {
            set.insert("challenge_id", uuid_as_binary(challenge_id));
        }

        let updated = self
            .collection()
            .await
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateMatch { id, source })?;

        if let Some(document) = updated {
            return Ok(UpdateOutcome::Updated(document.into()));
        }

        // The conditional write matched nothing: either the row is gone or it
        // sits in a status the requested transition is illegal from.
        match (self.find(id).await?, update.status) {
            (None, _) => Ok(UpdateOutcome::NotFound),
            (Some(row), Some(next)) => Ok(UpdateOutcome::InvalidTransition {
                from: row.status,
                to: next,
            }),
            (Some(row), None) => Ok(UpdateOutcome::Updated(row)),
        }
    }

    async fn delete(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteMatch { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn oldest_waiting(
        &self,
        exclude_creator: Option<Uuid>,
    ) -> MongoResult<Option<MatchEntity>> {
        let mut filter: Document = doc! {
            "status": status_literal(MatchStatus::Waiting),
            "guesser_id": null,
        };
        if let Some(creator) = exclude_creator {
            filter.insert("creator_id", doc! { "$ne": uuid_as_binary(creator) });
        }

        let document = self
            .collection()
            .await
            .find_one(filter)
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|source| MongoDaoError::FindWaiting { source })?;
        Ok(document.map(Into::into))
    }

    async fn claim(
        &self,
        id: Uuid,
        guesser_id: Uuid,
        guesser_name: Option<String>,
    ) -> MongoResult<ClaimOutcome> {
        // Single conditional update: the server evaluates filter and $set as
        // one indivisible step, so concurrent claimants cannot interleave.
        let mut filter = doc_id(id);
        filter.insert("status", status_literal(MatchStatus::Waiting));
        filter.insert("guesser_id", mongodb::bson::Bson::Null);

        let mut set = doc! {
            "status": status_literal(MatchStatus::Active),
            "guesser_id": uuid_as_binary(guesser_id),
            "updated_at": DateTime::now(),
        };
        if let Some(name) = guesser_name {
            set.insert("guesser_name", name);
        }

        let claimed = self
            .collection()
            .await
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::ClaimMatch { id, source })?;

        Ok(match claimed {
            Some(document) => ClaimOutcome::Claimed(document.into()),
            None => ClaimOutcome::Unavailable,
        })
    }
}

impl MatchStore for MongoMatchStore {
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create(entity).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find(id).await.map_err(Into::into) })
    }

    fn update_match(
        &self,
        id: Uuid,
        update: MatchUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.update(id, update).await.map_err(Into::into) })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete(id).await.map_err(Into::into) })
    }

    fn find_oldest_waiting(
        &self,
        exclude_creator: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.oldest_waiting(exclude_creator).await.map_err(Into::into) })
    }

    fn claim_match(
        &self,
        id: Uuid,
        guesser_id: Uuid,
        guesser_name: Option<String>,
    ) -> BoxFuture<'static, StorageResult<ClaimOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .claim(id, guesser_id, guesser_name)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
