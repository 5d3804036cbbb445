//! Single owner thread for the kernel pool.
//!
//! Every read or mutation of the pool is shipped to the host thread as a closure, which
//! serialises concurrent requests without a lock around the pool.

use std::any::Any;
use std::thread::JoinHandle;

use crate::pool::{KernelPool, PoolError};

type BoxAny = Box<dyn Any + Send>;

struct Call {
    f: Box<dyn FnOnce(&mut KernelPool) -> BoxAny + Send>,
    ret: crossbeam::channel::Sender<BoxAny>,
}

pub struct PoolHost {
    accessor: PoolAccessor,
    abort_tx: crossbeam::channel::Sender<()>,
    join_handle: Option<JoinHandle<KernelPool>>,
}

impl PoolHost {
    pub fn spawn(pool: KernelPool) -> Self {
        let (abort_tx, abort_rx) = crossbeam::channel::unbounded::<()>();
        let (tx, rx) = crossbeam::channel::unbounded::<Call>();
        let join_handle = std::thread::Builder::new()
            .name("kernel-pool".into())
            .spawn(move || {
                let mut pool = pool;
                loop {
                    crossbeam::channel::select! {
                        recv(rx) -> msg => match msg {
                            Ok(Call { f, ret }) => {
                                let _ = ret.send(f(&mut pool));
                            }
                            Err(_) => break,
                        },
                        recv(abort_rx) -> _ => break,
                    }
                }
                pool
            })
            .ok();
        if join_handle.is_none() {
            log::error!("Failed to spawn the kernel pool thread");
        }

        Self {
            accessor: PoolAccessor { tx },
            abort_tx,
            join_handle,
        }
    }

    pub fn accessor(&self) -> PoolAccessor {
        self.accessor.clone()
    }

    /// Stop the host thread and take the pool back.
    pub fn into_pool(mut self) -> Result<KernelPool, PoolError> {
        let _ = self.abort_tx.send(());
        self.join_handle
            .take()
            .ok_or(PoolError::HostStopped)?
            .join()
            .map_err(|_| PoolError::HostStopped)
    }
}

impl std::ops::Deref for PoolHost {
    type Target = PoolAccessor;

    fn deref(&self) -> &Self::Target {
        &self.accessor
    }
}

impl Drop for PoolHost {
    fn drop(&mut self) {
        let _ = self.abort_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Cloneable handle sending work to the [`PoolHost`] thread.
#[derive(Clone)]
pub struct PoolAccessor {
    tx: crossbeam::channel::Sender<Call>,
}

impl std::fmt::Debug for PoolAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolAccessor").finish_non_exhaustive()
    }
}

impl PoolAccessor {
    /// Run `f` on the host thread and wait for its result.
    pub fn with<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut KernelPool) -> R + Send + 'static,
    ) -> Result<R, PoolError> {
        let (ret_tx, ret_rx) = crossbeam::channel::bounded(1);
        self.tx
            .send(Call {
                f: Box::new(move |pool| Box::new(f(pool)) as BoxAny),
                ret: ret_tx,
            })
            .map_err(|_| PoolError::HostStopped)?;
        let ret = ret_rx.recv().map_err(|_| PoolError::HostStopped)?;
        ret.downcast::<R>()
            .map(|r| *r)
            .map_err(|_| PoolError::HostStopped)
    }
}
