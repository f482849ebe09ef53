use std::fmt;
use std::ops::{Deref, DerefMut};

use deadpool::managed::Object;
use tokio::sync::OwnedMappedMutexGuard;

use super::DriverManager;
use crate::driver::Driver;

/// A connection borrowed from a `ConnectionManager` for one operation.
///
/// Dropping a pooled checkout hands the connection back to the pool. Dropping a single-mode
/// checkout unlocks the cached connection, which stays open for the next caller.
pub enum Checkout<D: Driver> {
    Pooled(Object<DriverManager<D>>),
    Single(OwnedMappedMutexGuard<Option<D::Connection>, D::Connection>),
}

impl<D: Driver> Checkout<D> {
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        matches!(self, Checkout::Pooled(_))
    }
}

impl<D: Driver> Deref for Checkout<D> {
    type Target = D::Connection;

    fn deref(&self) -> &Self::Target {
        match self {
            Checkout::Pooled(conn) => &**conn,
            Checkout::Single(conn) => &**conn,
        }
    }
}

impl<D: Driver> DerefMut for Checkout<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Checkout::Pooled(conn) => &mut **conn,
            Checkout::Single(conn) => &mut **conn,
        }
    }
}

impl<D: Driver> fmt::Debug for Checkout<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkout::Pooled(_) => f.write_str("Checkout::Pooled"),
            Checkout::Single(_) => f.write_str("Checkout::Single"),
        }
    }
}
