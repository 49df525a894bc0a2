use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineError};

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Compact the journal once enough appends have piled up since the last
/// rewrite. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        debug!(appends, threshold, "journal compaction not due");
        return Ok(false);
    }
    engine.compact_wal().await?;
    info!(appends, "journal compacted");
    Ok(true)
}

/// Background task that checks the journal every minute.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&engine, threshold).await {
            warn!("journal compaction failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::wal::Wal;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("rigslot_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn churn(engine: &Engine, eq: Ulid, rounds: usize) {
        for _ in 0..rounds {
            engine.start_maintenance(eq, Some("cleaning".into())).await.unwrap();
            engine.end_maintenance(eq).await.unwrap();
        }
    }

    #[tokio::test]
    async fn below_threshold_is_left_alone() {
        let path = test_wal_path("below.wal");
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        let eq = Ulid::new();
        engine.register_equipment(eq, "PC-01".into(), EquipmentKind::Pc).await.unwrap();
        churn(&engine, eq, 2).await;

        assert!(!compact_if_due(&engine, 100).await.unwrap());
        assert_eq!(Wal::replay(&path).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn over_threshold_rewrites_the_journal() {
        let path = test_wal_path("over.wal");
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        let eq = Ulid::new();
        engine.register_equipment(eq, "PC-01".into(), EquipmentKind::Pc).await.unwrap();
        churn(&engine, eq, 10).await;

        assert!(compact_if_due(&engine, 10).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        assert_eq!(
            Wal::replay(&path).unwrap(),
            vec![Event::EquipmentRegistered {
                id: eq,
                name: "PC-01".into(),
                kind: EquipmentKind::Pc,
            }]
        );
    }
}
