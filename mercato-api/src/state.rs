use std::sync::Arc;

use mercato_catalog::ProductCatalog;
use mercato_parties::CustomerDirectory;
use mercato_sales::{SaleEngine, SaleLedger};

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn CustomerDirectory>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub ledger: Arc<dyn SaleLedger>,
    pub engine: Arc<SaleEngine>,
}

impl AppState {
    /// Wire one storage backend into all three repository seams and hand
    /// the same seams to the engine.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: CustomerDirectory + ProductCatalog + SaleLedger + 'static,
    {
        let directory: Arc<dyn CustomerDirectory> = store.clone();
        let catalog: Arc<dyn ProductCatalog> = store.clone();
        let ledger: Arc<dyn SaleLedger> = store;
        let engine = Arc::new(SaleEngine::new(
            directory.clone(),
            catalog.clone(),
            ledger.clone(),
        ));
        Self {
            directory,
            catalog,
            ledger,
            engine,
        }
    }
}
