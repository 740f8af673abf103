use parking_lot::Mutex;
use std::sync::Arc;

// Stores partagés entre les callbacks UDP et les handlers HTTP.
// Les locks sont courts et jamais tenus à travers un await.
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
