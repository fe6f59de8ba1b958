//! Provider SKU metadata
//!
//! The metadata document is a JSON object; `nat_skus` lists every NAT SKU
//! the providers publish, each tagged with its provider-side region id.

use crate::error::{ComputeError, Result};
use crate::nat_sku::CloudNatSku;
use async_trait::async_trait;
use cloudplane_sync::{ExternalFetcher, SyncScope};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct MetaDocument {
    #[serde(default)]
    nat_skus: Vec<CloudNatSku>,
}

/// SKU metadata indexed by provider-side region id
#[derive(Debug, Default, Clone)]
pub struct SkuResourcesMeta {
    nat_skus: HashMap<String, Vec<CloudNatSku>>,
}

impl SkuResourcesMeta {
    pub fn from_nat_skus(skus: Vec<CloudNatSku>) -> Self {
        let mut nat_skus: HashMap<String, Vec<CloudNatSku>> = HashMap::new();
        for sku in skus {
            nat_skus.entry(sku.region_ext_id.clone()).or_default().push(sku);
        }
        Self { nat_skus }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let doc: MetaDocument = serde_json::from_str(text)?;
        Ok(Self::from_nat_skus(doc.nat_skus))
    }

    /// Read the metadata document at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ComputeError::Meta(format!("cannot read {}: {}", path.display(), e))
        })?;
        let meta = Self::from_json(&text)?;
        tracing::debug!(
            "Loaded SKU metadata from {}: {} region(s)",
            path.display(),
            meta.nat_skus.len()
        );
        Ok(meta)
    }

    /// NAT SKUs published for one region; empty when the region has none
    pub fn nat_skus_by_region_external_id(&self, region_ext_id: &str) -> Vec<CloudNatSku> {
        self.nat_skus
            .get(region_ext_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn nat_sku_count(&self) -> usize {
        self.nat_skus.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ExternalFetcher for SkuResourcesMeta {
    type Observation = CloudNatSku;

    async fn fetch_external(&self, scope: &SyncScope) -> cloudplane_sync::Result<Vec<CloudNatSku>> {
        Ok(self.nat_skus_by_region_external_id(&scope.region_external_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"{
        "nat_skus": [
            {"id": "m1", "name": "Small", "external_id": "Small", "provider": "Aliyun",
             "region_ext_id": "Aliyun/cn-beijing", "cps": 10000},
            {"id": "m2", "name": "Large", "external_id": "Large", "provider": "Aliyun",
             "region_ext_id": "Aliyun/cn-beijing", "postpaid_status": "soldout"},
            {"id": "m3", "name": "Small", "external_id": "Small", "provider": "Aliyun",
             "region_ext_id": "Aliyun/cn-hangzhou"}
        ]
    }"#;

    #[test]
    fn test_group_by_region() {
        let meta = SkuResourcesMeta::from_json(DOC).unwrap();
        assert_eq!(meta.nat_sku_count(), 3);

        let beijing = meta.nat_skus_by_region_external_id("Aliyun/cn-beijing");
        assert_eq!(beijing.len(), 2);
        assert_eq!(beijing[0].cps, 10000);
        assert_eq!(beijing[0].prepaid_status, "available");
        assert_eq!(beijing[1].postpaid_status, "soldout");
        assert!(meta.nat_skus_by_region_external_id("Aws/us-east-1").is_empty());
    }

    #[test]
    fn test_bad_document() {
        assert!(matches!(
            SkuResourcesMeta::from_json("{\"nat_skus\": 3}"),
            Err(ComputeError::JsonError(_))
        ));
        assert_eq!(SkuResourcesMeta::from_json("{}").unwrap().nat_sku_count(), 0);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();

        let meta = SkuResourcesMeta::load(file.path()).await.unwrap();
        assert_eq!(meta.nat_sku_count(), 3);

        let missing = SkuResourcesMeta::load(Path::new("/nonexistent/meta.json")).await;
        assert!(matches!(missing, Err(ComputeError::Meta(_))));
    }
}
