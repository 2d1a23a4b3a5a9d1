//! Exception handler registry.

use std::error::Error;

use crate::http::{RequestHead, Response};

type ErasedHandler =
    Box<dyn Fn(&(dyn Error + 'static), &RequestHead) -> Option<Response> + Send + Sync>;

struct Entry {
    type_name: &'static str,
    handler: ErasedHandler,
}

/// Maps error types to functions producing a response for them.
///
/// Lookup walks the error's `source()` chain and returns the handler for the
/// nearest error in it; at one level, later registrations win.
#[derive(Default)]
pub struct ExceptionHandlers {
    entries: Vec<Entry>,
}

impl ExceptionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Error + 'static,
        F: Fn(&E, &RequestHead) -> Response + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            type_name: std::any::type_name::<E>(),
            handler: Box::new(move |error, head| {
                error.downcast_ref::<E>().map(|error| handler(error, head))
            }),
        });
        self
    }

    /// Response from the closest handler for `error`, if any.
    pub fn handle(&self, error: &(dyn Error + 'static), head: &RequestHead) -> Option<Response> {
        let mut current = Some(error);
        while let Some(candidate) = current {
            for entry in self.entries.iter().rev() {
                if let Some(response) = (entry.handler)(candidate, head) {
                    tracing::debug!(error_type = entry.type_name, "exception handler applied");
                    return Some(response);
                }
            }
            current = candidate.source();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ExceptionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.type_name))
            .finish()
    }
}
