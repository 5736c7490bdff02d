//! Streaming callbacks and the process-wide registry used to
//! persist them by key.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use log::{debug, error};

use crate::chat_message::StreamingChunk;
use crate::error::Error;

pub type StreamingFn = dyn Fn(&StreamingChunk) + Send + Sync;

/// Key under which `print_streaming_chunk` is pre-registered
pub const PRINT_STREAMING_CHUNK: &str = "print_streaming_chunk";

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, Arc<StreamingFn>>> = {
        let mut callbacks: HashMap<String, Arc<StreamingFn>> = HashMap::new();
        callbacks.insert(
            PRINT_STREAMING_CHUNK.to_string(),
            Arc::new(print_streaming_chunk),
        );
        RwLock::new(callbacks)
    };
}

/// Callback invoked once per streamed chunk, in arrival order
#[derive(Clone)]
pub struct StreamingCallback
{   key: Option<String>
  , func: Arc<StreamingFn>
}

impl StreamingCallback
{   /// A callback that is not in the registry; serializes as null
    pub fn anonymous<F>(f: F) -> Self
    where F: Fn(&StreamingChunk) + Send + Sync + 'static
    {   StreamingCallback
        {   key: None
          , func: Arc::new(f)
        }
    }

    /// Registry key, if any
    pub fn key(&self) -> Option<&str>
    {   self.key.as_deref()
    }

    pub fn call(&self, chunk: &StreamingChunk)
    {   (self.func)(chunk)
    }
}

impl fmt::Debug for StreamingCallback
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.debug_struct("StreamingCallback")
          .field("key", &self.key)
          .finish_non_exhaustive()
    }
}

/// Writes the chunk content to stdout as soon as it arrives
pub fn print_streaming_chunk(chunk: &StreamingChunk)
{   let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{}", chunk.content);
    let _ = stdout.flush();
}

/// Register `f` under `key`, replacing any previous entry,
/// and return a handle that serializes as `key`.
pub fn register_streaming_callback<F>(
  key: &str
, f: F
) -> Result<StreamingCallback, Error>
where F: Fn(&StreamingChunk) + Send + Sync + 'static
{   debug!("Registering streaming callback: {}", key);
    let func: Arc<StreamingFn> = Arc::new(f);
    let mut registry = REGISTRY.write().map_err(|_| {
      error!("Streaming callback registry poisoned");
      Error::Other("streaming callback registry poisoned".to_string())
    })?;
    registry.insert(key.to_string(), Arc::clone(&func));
    Ok(StreamingCallback
    {   key: Some(key.to_string())
      , func
    })
}

/// Look up a previously registered callback by key
pub fn resolve_streaming_callback(
  key: &str
) -> Result<StreamingCallback, Error>
{   let registry = REGISTRY.read().map_err(|_| {
      error!("Streaming callback registry poisoned");
      Error::Other("streaming callback registry poisoned".to_string())
    })?;
    match registry.get(key)
    {   Some(func) => {
          debug!("Resolved streaming callback: {}", key);
          Ok(StreamingCallback
          {   key: Some(key.to_string())
            , func: Arc::clone(func)
          })
        }
      , None => {
          error!("Unknown streaming callback: {}", key);
          Err(Error::Deserialization(format!(
            "Could not locate the streaming callback: {}", key
          )))
        }
    }
}

/// Resolve an optional persisted key
pub(crate) fn resolve_optional(
  key: Option<&str>
) -> Result<Option<StreamingCallback>, Error>
{   key.map(resolve_streaming_callback).transpose()
}

#[cfg(test)]
mod tests
{   use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_callback_is_registered()
    {   let callback
          = resolve_streaming_callback(PRINT_STREAMING_CHUNK).unwrap();
        assert_eq!(callback.key(), Some(PRINT_STREAMING_CHUNK));
    }

    #[test]
    fn test_register_then_resolve_shares_the_function()
    {   static CALLS: AtomicUsize = AtomicUsize::new(0);
        register_streaming_callback(
          "callbacks_tests::count",
          |_chunk| { CALLS.fetch_add(1, Ordering::SeqCst); }
        ).unwrap();

        let resolved
          = resolve_streaming_callback("callbacks_tests::count").unwrap();
        resolved.call(&StreamingChunk::new("a"));
        resolved.call(&StreamingChunk::new("b"));
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_key_fails()
    {   let err = resolve_streaming_callback("no_such::callback")
          .unwrap_err();
        assert_eq!(
          err,
          Error::Deserialization(
            "Could not locate the streaming callback: no_such::callback"
              .to_string()
          )
        );
    }

    #[test]
    fn test_anonymous_has_no_key()
    {   let callback = StreamingCallback::anonymous(|_| {});
        assert_eq!(callback.key(), None);
        assert!(resolve_optional(None).unwrap().is_none());
    }
}
