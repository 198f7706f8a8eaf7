//! Settings fetcher (C2, §4.2): resolve a per-problem [`Setting`] from
//! object storage, memoised in a process-wide TTL cache.

use hub_common::cache::TtlCache;
use hub_common::s3::ObjectStore;
use hub_types::{Room, Setting};

use crate::naming;
use crate::util::Error;

/// `FetchSetting`: if `room.setting` is already present this is a no-op.
/// Otherwise resolves the problem's Setting via the TTL cache, fetching
/// from object storage on a miss, and attaches a clone to `room.setting`.
pub async fn fetch(
    store: &ObjectStore,
    cache: &TtlCache<Setting>,
    room: &mut Room,
) -> Result<(), Error> {
    if room.spec.setting.is_some() {
        return Ok(());
    }

    let problem_id = room.spec.problem_id.clone();
    let cache_key = naming::settings_cache_key(&problem_id);
    let setting = cache
        .get_or_fetch(&cache_key, || async {
            store
                .get_struct::<Setting>(naming::SETTINGS_BUCKET, &naming::settings_object_key(&problem_id))
                .await
        })
        .await
        .map_err(|e| Error::ConfigMissing(format!("setting for problem {}: {e}", room.spec.problem_id)))?;

    room.spec.setting = Some(setting);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_common::args::S3Args;
    use std::time::Duration;

    #[tokio::test]
    async fn no_op_when_setting_already_present() {
        let store = ObjectStore::connect(&S3Args {
            s3_url: "http://localhost:9000".to_string(),
            s3_access_key: "test".to_string(),
            s3_secret_key: "test".to_string(),
        })
        .await;
        let cache: TtlCache<Setting> = TtlCache::new(Duration::from_secs(60));
        let mut room = Room::new("r1", Default::default());
        room.spec.setting = Some(Setting::default());

        fetch(&store, &cache, &mut room).await.unwrap();

        assert_eq!(room.spec.setting, Some(Setting::default()));
    }
}
