pub use derivative::Derivative;
pub use futures::{
    ready,
    stream::{Stream, StreamExt},
};
pub use pin_project::pin_project;
pub use std::{
    any::Any,
    cmp::{self, Ordering::*},
    collections::HashMap,
    fmt::Debug,
    mem,
    panic::{catch_unwind, AssertUnwindSafe},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering::*},
        Arc,
    },
    task::{Context, Poll, Poll::Ready},
    thread,
};
