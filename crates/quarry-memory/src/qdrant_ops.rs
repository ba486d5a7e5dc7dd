//! Qdrant-backed [`VectorStore`].

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, vectors_config,
};
use uuid::Uuid;

use crate::vector_store::{
    BoxFuture, CollectionInfo, CollectionStatus, Payload, ScoredVectorPoint, ScrollPage,
    StoredPoint, VectorPoint, VectorStore, VectorStoreError,
};

/// Thin wrapper over the [`Qdrant`] gRPC client.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a client for the given gRPC URL. No request is made until first use.
    ///
    /// # Errors
    ///
    /// Returns `VectorStoreError::Connection` if the URL is rejected by the client builder.
    pub fn new(url: &str) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

/// Map a caller-supplied chunk id onto a Qdrant point id.
///
/// Qdrant only accepts UUIDs and unsigned integers; any other string is mapped to a
/// deterministic UUIDv5 so re-upserting the same id overwrites the same point.
#[must_use]
pub fn point_id_for(id: &str) -> PointId {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return PointId::from(uuid.to_string());
    }
    if let Ok(n) = id.parse::<u64>() {
        return PointId::from(n);
    }
    PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string())
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn value_to_json(value: qdrant_client::qdrant::Value) -> Option<serde_json::Value> {
    let json = match value.kind? {
        Kind::NullValue(_) => serde_json::Value::Null,
        Kind::StringValue(s) => serde_json::Value::String(s),
        Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
        Kind::DoubleValue(d) => serde_json::Number::from_f64(d).map(serde_json::Value::Number)?,
        Kind::BoolValue(b) => serde_json::Value::Bool(b),
        Kind::ListValue(list) => {
            serde_json::Value::Array(list.values.into_iter().filter_map(value_to_json).collect())
        }
        Kind::StructValue(s) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .filter_map(|(k, v)| value_to_json(v).map(|j| (k, j)))
                .collect(),
        ),
    };
    Some(json)
}

fn payload_to_json(payload: HashMap<String, qdrant_client::qdrant::Value>) -> Payload {
    payload
        .into_iter()
        .filter_map(|(k, v)| value_to_json(v).map(|j| (k, j)))
        .collect()
}

fn json_to_payload(
    payload: Payload,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))
}

fn map_status(raw: i32) -> CollectionStatus {
    use qdrant_client::qdrant::CollectionStatus as Raw;
    match Raw::try_from(raw) {
        Ok(Raw::Green) => CollectionStatus::Green,
        Ok(Raw::Yellow) => CollectionStatus::Yellow,
        Ok(Raw::Red) => CollectionStatus::Red,
        Ok(Raw::Grey) => CollectionStatus::Grey,
        _ => CollectionStatus::Unknown,
    }
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(false);
            }
            let created = self
                .client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await;
            match created {
                Ok(_) => Ok(true),
                // A concurrent writer may have created it between the check and the create.
                Err(e) => match self.client.collection_exists(collection.as_str()).await {
                    Ok(true) => Ok(false),
                    _ => Err(VectorStoreError::Collection(e.to_string())),
                },
            }
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn collection_info(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<Option<CollectionInfo>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if !self.collection_exists(collection.as_str()).await? {
                return Ok(None);
            }
            let response = self
                .client
                .collection_info(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let Some(info) = response.result else {
                return Ok(None);
            };
            let vector_size = info
                .config
                .as_ref()
                .and_then(|c| c.params.as_ref())
                .and_then(|p| p.vectors_config.as_ref())
                .and_then(|v| v.config.as_ref())
                .and_then(|c| match c {
                    vectors_config::Config::Params(params) => Some(params.size),
                    vectors_config::Config::ParamsMap(_) => None,
                });
            Ok(Some(CollectionInfo {
                points_count: info.points_count.unwrap_or(0),
                vector_size,
                status: map_status(info.status),
            }))
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .list_collections()
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            let mut names: Vec<String> =
                response.collections.into_iter().map(|c| c.name).collect();
            names.sort();
            Ok(names)
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_points = points
                .into_iter()
                .map(|p| {
                    let payload = json_to_payload(p.payload)
                        .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
                    Ok(PointStruct::new(point_id_for(&p.id), p.vector, payload))
                })
                .collect::<Result<Vec<_>, VectorStoreError>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, qdrant_points).wait(true))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let response = self
                .client
                .search_points(SearchPointsBuilder::new(&collection, vector, limit).with_payload(true))
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(response
                .result
                .into_iter()
                .map(|p| ScoredVectorPoint {
                    id: point_id_to_string(p.id),
                    score: p.score,
                    payload: payload_to_json(p.payload),
                })
                .collect())
        })
    }

    fn scroll_page(
        &self,
        collection: &str,
        limit: u32,
        offset: Option<String>,
    ) -> BoxFuture<'_, Result<ScrollPage, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut builder = ScrollPointsBuilder::new(&collection)
                .with_payload(true)
                .with_vectors(false)
                .limit(limit);
            if let Some(off) = offset.as_deref() {
                builder = builder.offset(point_id_for(off));
            }

            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(|e| VectorStoreError::Scroll(e.to_string()))?;

            let points = response
                .result
                .into_iter()
                .map(|p| StoredPoint {
                    id: point_id_to_string(p.id),
                    payload: payload_to_json(p.payload),
                })
                .collect();
            let next_offset = response
                .next_page_offset
                .map(|id| point_id_to_string(Some(id)))
                .filter(|id| !id.is_empty());

            Ok(ScrollPage {
                points,
                next_offset,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_url() {
        assert!(QdrantOps::new("http://localhost:6334").is_ok());
    }

    #[test]
    fn debug_format() {
        let ops = QdrantOps::new("http://localhost:6334").unwrap();
        assert!(format!("{ops:?}").contains("QdrantOps"));
    }

    #[test]
    fn point_id_keeps_uuid() {
        let raw = "5f0c4a1e-2d7b-4c1a-9a55-0b8f1e3c2d11";
        assert_eq!(point_id_to_string(Some(point_id_for(raw))), raw);
    }

    #[test]
    fn point_id_keeps_integer() {
        let id = point_id_for("42");
        assert!(matches!(id.point_id_options, Some(PointIdOptions::Num(42))));
    }

    #[test]
    fn point_id_maps_free_text_deterministically() {
        let a = point_id_to_string(Some(point_id_for("handbook-p3")));
        let b = point_id_to_string(Some(point_id_for("handbook-p3")));
        let c = point_id_to_string(Some(point_id_for("handbook-p4")));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn payload_round_trips_through_qdrant_values() {
        let mut payload = Payload::new();
        payload.insert("text".into(), serde_json::json!("Vacation policy"));
        payload.insert("page".into(), serde_json::json!(3));
        payload.insert("tags".into(), serde_json::json!(["hr", "leave"]));
        payload.insert("meta".into(), serde_json::json!({"draft": false}));

        let back = payload_to_json(json_to_payload(payload.clone()).unwrap());
        assert_eq!(back, payload);
    }

    #[test]
    fn json_to_payload_builds_nested_kinds() {
        let mut payload = Payload::new();
        payload.insert("score".into(), serde_json::json!(0.5));
        payload.insert("meta".into(), serde_json::json!({"source": "handbook", "pages": [1, 2]}));

        let converted = json_to_payload(payload).unwrap();
        assert!(matches!(
            converted["score"].kind,
            Some(Kind::DoubleValue(d)) if (d - 0.5).abs() < f64::EPSILON
        ));
        let Some(Kind::StructValue(meta)) = &converted["meta"].kind else {
            panic!("expected struct value, got {:?}", converted["meta"]);
        };
        assert!(matches!(meta.fields["source"].kind, Some(Kind::StringValue(ref s)) if s == "handbook"));
        assert!(matches!(meta.fields["pages"].kind, Some(Kind::ListValue(ref l)) if l.values.len() == 2));
    }

    #[test]
    fn status_mapping_covers_unknown_values() {
        assert_eq!(map_status(1), CollectionStatus::Green);
        assert_eq!(map_status(2), CollectionStatus::Yellow);
        assert_eq!(map_status(0), CollectionStatus::Unknown);
        assert_eq!(map_status(99), CollectionStatus::Unknown);
    }
}
