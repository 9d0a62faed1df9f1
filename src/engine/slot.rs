use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Mutex as AsyncMutex;

use super::core::EngineFacade;
use crate::error::EngineError;

/// Shared handle to the live facade.
pub type SharedEngine = Arc<AsyncMutex<EngineFacade>>;

type Factory = Box<dyn Fn() -> anyhow::Result<EngineFacade> + Send + Sync>;

/// Composition-root slot holding at most one [`EngineFacade`].
///
/// `instance()` builds the facade on first use and hands out the same one
/// until `destroy()` tears it down and empties the slot; the next
/// `instance()` then builds fresh state.
pub struct EngineSlot {
    factory: Factory,
    current: Mutex<Option<SharedEngine>>,
}

impl EngineSlot {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<EngineFacade> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            current: Mutex::new(None),
        }
    }

    pub fn instance(&self) -> anyhow::Result<SharedEngine> {
        let mut current = self.lock();
        if let Some(engine) = current.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(AsyncMutex::new((self.factory)()?));
        log::info!("[EngineSlot] Constructed engine instance");
        *current = Some(Arc::clone(&engine));
        Ok(engine)
    }

    pub fn is_live(&self) -> bool {
        self.lock().is_some()
    }

    /// Tear down the live facade (if any) and reset the slot.
    ///
    /// The slot is emptied before the facade is closed, so a concurrent
    /// `instance()` never observes a half-destroyed engine.
    pub async fn destroy(&self) -> Result<(), EngineError> {
        let taken = self.lock().take();
        let Some(engine) = taken else {
            return Ok(());
        };

        let result = engine.lock().await.destroy().await;
        log::info!("[EngineSlot] Slot reset");
        result
    }

    fn lock(&self) -> MutexGuard<'_, Option<SharedEngine>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
