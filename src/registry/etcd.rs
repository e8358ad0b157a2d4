//! etcd v3 backed [`RegistryStore`].

use async_trait::async_trait;
use etcd_client::{Client, DeleteOptions, GetOptions};
use log::{debug, info, warn};

use super::RegistryStore;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        info!("Connecting to etcd at {:?}", endpoints);
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| Error::registry("connect", e))?;
        Ok(Self { client })
    }
}

/// `a/b` and `a/b/` both address the keys strictly below `a/b/`.
fn subtree(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

/// Turn a raw etcd pair into text.
///
/// A key that is not UTF-8 cannot belong to the layout and is skipped.  A
/// value that is not UTF-8 is decoded lossily so the entry stays visible and
/// gets replaced by the next write.
fn decode(key: &[u8], value: &[u8]) -> Option<(String, String)> {
    let Ok(key) = std::str::from_utf8(key) else {
        warn!(
            "Skipping registry key that is not UTF-8: {}",
            String::from_utf8_lossy(key)
        );
        return None;
    };
    let value = match std::str::from_utf8(value) {
        Ok(value) => value.to_string(),
        Err(e) => {
            warn!("Value of {} is not UTF-8: {}", key, e);
            String::from_utf8_lossy(value).into_owned()
        }
    };
    Some((key.to_string(), value))
}

#[async_trait]
impl RegistryStore for EtcdStore {
    async fn read(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut client = self.client.clone();
        let resp = client
            .get(subtree(prefix), Some(GetOptions::new().with_prefix()))
            .await
            .map_err(|e| Error::registry(format!("read {}", prefix), e))?;

        let entries: Vec<_> = resp
            .kvs()
            .iter()
            .filter_map(|kv| decode(kv.key(), kv.value()))
            .collect();
        debug!("Read {} keys under {}", entries.len(), prefix);
        Ok(entries)
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut client = self.client.clone();
        client
            .put(key, value, None)
            .await
            .map_err(|e| Error::registry(format!("write {}", key), e))?;
        Ok(())
    }

    async fn delete(&self, prefix: &str) -> Result<()> {
        let mut client = self.client.clone();
        let operation = format!("delete {}", prefix);
        // The subtree root itself may hold a value too.
        client
            .delete(prefix.trim_end_matches('/'), None)
            .await
            .map_err(|e| Error::registry(&operation, e))?;
        let resp = client
            .delete(subtree(prefix), Some(DeleteOptions::new().with_prefix()))
            .await
            .map_err(|e| Error::registry(&operation, e))?;
        debug!("Deleted {} keys under {}", resp.deleted(), prefix);
        Ok(())
    }
}
