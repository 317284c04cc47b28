use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use pin_project_lite::pin_project;
use smol::Timer;

use crate::{Result, Runtime, SleepProvider};

/// Runs the refill loop as a detached [`smol`](https://docs.rs/smol) task and
/// uses smol's timer for backoff and timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolRuntime;

pin_project! {
    /// A [`Timer`] that resolves to `()`.
    #[must_use = "futures do nothing unless polled"]
    pub struct SmolSleep {
        #[pin]
        timer: Timer,
    }
}

impl Future for SmolSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().timer.poll(cx).map(|_| ())
    }
}

impl SleepProvider for SmolRuntime {
    type Sleep = SmolSleep;

    fn sleep_for(dur: Duration) -> Self::Sleep {
        SmolSleep {
            timer: Timer::after(dur),
        }
    }
}

impl Runtime for SmolRuntime {
    fn spawn<F>(fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        smol::spawn(fut).detach();
        Ok(())
    }
}
