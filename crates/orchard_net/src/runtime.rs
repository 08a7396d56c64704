use std::future::Future;

use bevy::prelude::Resource;

/// Handle to a background task started on a [`Runtime`].
pub trait JoinHandle: Send + Sync + 'static {
    /// Stop the task.
    fn abort(&mut self);
}

/// A runtime able to host the provider's async accept/recv/send loops.
pub trait Runtime: Send + Sync + 'static {
    /// The handle returned for spawned tasks.
    type JoinHandle: JoinHandle;

    /// Spawn a task that runs to completion in the background.
    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) -> Self::JoinHandle;
}

/// Resource holding the runtime used for network tasks.
///
/// Bevy's [`TaskPool`](bevy::tasks::TaskPool) is the default runtime.
#[derive(Resource)]
pub struct NetRuntime<RT: Runtime>(pub RT);

pub(crate) fn run_async<RT: Runtime>(
    task: impl Future<Output = ()> + Send + 'static,
    runtime: &RT,
) -> RT::JoinHandle {
    runtime.spawn(task)
}

impl Runtime for bevy::tasks::TaskPool {
    type JoinHandle = Option<bevy::tasks::Task<()>>;

    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) -> Self::JoinHandle {
        let task = self.spawn(task);
        task.detach();
        None
    }
}

impl JoinHandle for Option<bevy::tasks::Task<()>> {
    fn abort(&mut self) {
        self.take();
    }
}
