//! Command/query dispatcher.
//!
//! A typed mediator: every engine in the core is invoked exclusively through
//! handlers registered here. Exactly one handler may be registered per
//! concrete request type; duplicates are a configuration error at startup.
//! Dispatch is by the runtime type of the request, execution is async, and
//! handler failures come back as `Err`; nothing escapes `send` as a panic.
//!
//! The dispatcher performs no retries and no business validation. The only
//! thing it runs besides the handler is the request's [`Request::validate`]
//! hook, which rejects malformed input before a handler ever sees it.
//!
//! The dispatcher is an explicit object built once during process
//! initialization and shared by handle; there is no global singleton.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::AuthResult;
use crate::error::AuthError;

// ============================================================================
// Request Traits
// ============================================================================

/// A dispatchable request with a typed result.
pub trait Request: Send + 'static {
    /// The result type the handler produces.
    type Output: Send + 'static;

    /// Validates the request's shape before dispatch.
    ///
    /// Malformed input is rejected here with `Validation`, before any
    /// handler runs. Business rules belong in handlers, not here.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the input is malformed.
    fn validate(&self) -> AuthResult<()> {
        Ok(())
    }
}

/// A request that mutates state.
pub trait Command: Request {}

/// A request that reads state without mutation.
pub trait Query: Request {}

/// Handles a single command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Executes the command.
    async fn handle(&self, command: C) -> AuthResult<C::Output>;
}

/// Handles a single query type.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    /// Executes the query.
    async fn handle(&self, query: Q) -> AuthResult<Q::Output>;
}

// ============================================================================
// Dispatcher
// ============================================================================

type ErasedOutput = Box<dyn Any + Send>;
type ErasedHandler =
    Box<dyn Fn(Box<dyn Any + Send>) -> BoxFuture<'static, AuthResult<ErasedOutput>> + Send + Sync>;

/// Builder collecting handler registrations during process initialization.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<TypeId, ErasedHandler>,
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl DispatcherBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for a command type.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a handler is already registered for `C`,
    /// fatal at startup.
    pub fn register_command<C, H>(&mut self, handler: H) -> AuthResult<&mut Self>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let handler = Arc::new(handler);
        self.register::<C>(Box::new(move |boxed| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let command = downcast_request::<C>(boxed)?;
                let output = handler.handle(command).await?;
                Ok(Box::new(output) as ErasedOutput)
            })
        }))
    }

    /// Registers the handler for a query type.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a handler is already registered for `Q`,
    /// fatal at startup.
    pub fn register_query<Q, H>(&mut self, handler: H) -> AuthResult<&mut Self>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let handler = Arc::new(handler);
        self.register::<Q>(Box::new(move |boxed| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let query = downcast_request::<Q>(boxed)?;
                let output = handler.handle(query).await?;
                Ok(Box::new(output) as ErasedOutput)
            })
        }))
    }

    fn register<R: Request>(&mut self, erased: ErasedHandler) -> AuthResult<&mut Self> {
        match self.handlers.entry(TypeId::of::<R>()) {
            std::collections::hash_map::Entry::Occupied(_) => Err(AuthError::configuration(
                format!("Handler already registered for {}", type_name::<R>()),
            )),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(erased);
                Ok(self)
            }
        }
    }

    /// Finalizes the registrations into an immutable dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Routes typed requests to their registered handlers.
///
/// Cheap to clone; all clones share the same handler table.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HashMap<TypeId, ErasedHandler>>,
}

impl Dispatcher {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatches a request to its handler and awaits the result.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the request fails its own validation,
    /// `Configuration` if no handler is registered for the type, or
    /// whatever the handler itself returns.
    pub async fn send<R: Request>(&self, request: R) -> AuthResult<R::Output> {
        request.validate()?;

        let handler = self.handlers.get(&TypeId::of::<R>()).ok_or_else(|| {
            AuthError::configuration(format!("No handler registered for {}", type_name::<R>()))
        })?;

        let output = handler(Box::new(request)).await?;
        output.downcast::<R::Output>().map(|boxed| *boxed).map_err(|_| {
            AuthError::internal(format!(
                "Handler for {} returned an unexpected output type",
                type_name::<R>()
            ))
        })
    }
}

fn downcast_request<R: Request>(boxed: Box<dyn Any + Send>) -> AuthResult<R> {
    boxed.downcast::<R>().map(|boxed| *boxed).map_err(|_| {
        AuthError::internal(format!(
            "Dispatch table corrupted for {}",
            type_name::<R>()
        ))
    })
}

// ============================================================================
// Tests
// ============================================================================
