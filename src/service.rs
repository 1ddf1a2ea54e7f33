//! lazily initialized, injectable dependencies (MP3 encoder backend, video engine)
//!
//! A `LazyService` loads its value at most once. Concurrent first callers all
//! await the same in-flight load instead of starting their own. A failed load
//! parks the service in `Failed` until `reset_failed` is called, so a batch does
//! not hammer a broken dependency once per file.

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::ConvertError;

type LoadResult<T> = Result<Arc<T>, String>;
type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ConvertError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

enum State<T> {
    Uninitialized,
    Loading(Shared<BoxFuture<'static, LoadResult<T>>>),
    Ready(Arc<T>),
    Failed(String),
}

pub struct LazyService<T> {
    name: &'static str,
    state: Mutex<State<T>>,
    loader: Loader<T>,
}

impl<T> LazyService<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ConvertError>> + Send + 'static,
    {
        Self {
            name,
            state: Mutex::new(State::Uninitialized),
            loader: Box::new(move || loader().boxed()),
        }
    }

    /// a service that is already loaded; used to inject prepared dependencies
    pub fn ready(name: &'static str, value: T) -> Self {
        Self {
            name,
            state: Mutex::new(State::Ready(Arc::new(value))),
            loader: Box::new(move || {
                async move { Err(ConvertError::Other(format!("{} has no loader", name))) }.boxed()
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> ServiceStatus {
        match &*self.lock() {
            State::Uninitialized => ServiceStatus::Uninitialized,
            State::Loading(_) => ServiceStatus::Loading,
            State::Ready(_) => ServiceStatus::Ready,
            State::Failed(_) => ServiceStatus::Failed,
        }
    }

    /// returns the loaded value, loading it first if nobody has yet
    pub async fn get(&self) -> Result<Arc<T>, ConvertError> {
        let in_flight = {
            let mut state = self.lock();
            match &*state {
                State::Ready(value) => return Ok(value.clone()),
                State::Failed(reason) => return Err(self.load_error(reason)),
                State::Loading(fut) => {
                    debug!("{}: joining in-flight initialization", self.name);
                    fut.clone()
                }
                State::Uninitialized => {
                    info!("{}: initializing", self.name);
                    let fut = (self.loader)()
                        .map(|res| res.map(Arc::new).map_err(|e| e.to_string()))
                        .boxed()
                        .shared();
                    *state = State::Loading(fut.clone());
                    fut
                }
            }
        };

        let outcome = in_flight.await;

        let mut state = self.lock();
        match outcome {
            Ok(value) => {
                if matches!(*state, State::Loading(_)) {
                    info!("{}: ready", self.name);
                    *state = State::Ready(value.clone());
                }
                Ok(value)
            }
            Err(reason) => {
                if matches!(*state, State::Loading(_)) {
                    warn!("{}: initialization failed: {}", self.name, reason);
                    *state = State::Failed(reason.clone());
                }
                Err(self.load_error(&reason))
            }
        }
    }

    /// allows a failed service to be loaded again on the next `get`
    pub fn reset_failed(&self) {
        let mut state = self.lock();
        if matches!(*state, State::Failed(_)) {
            debug!("{}: clearing failed state", self.name);
            *state = State::Uninitialized;
        }
    }

    fn load_error(&self, reason: &str) -> ConvertError {
        ConvertError::DependencyLoad { name: self.name.to_string(), reason: reason.to_string() }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
