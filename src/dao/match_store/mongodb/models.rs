use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{MatchEntity, MatchStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    status: MatchStatus,
    creator_id: Uuid,
    creator_name: Option<String>,
    guesser_id: Option<Uuid>,
    guesser_name: Option<String>,
    challenge_id: Option<Uuid>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            status: value.status,
            creator_id: value.creator_id,
            creator_name: value.creator_name,
            guesser_id: value.guesser_id,
            guesser_name: value.guesser_name,
            challenge_id: value.challenge_id,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            status: value.status,
            creator_id: value.creator_id,
            creator_name: value.creator_name,
            guesser_id: value.guesser_id,
            guesser_name: value.guesser_name,
            challenge_id: value.challenge_id,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// The wire representation of a status, for use inside query filters.
pub fn status_literal(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Creating => "creating",
        MatchStatus::Waiting => "waiting",
        MatchStatus::Active => "active",
        MatchStatus::Failed => "failed",
        MatchStatus::Finished => "finished",
    }
}
