//! C-compatible exports called by the native host

use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};

use tracing::instrument;
use tracing_subscriber::EnvFilter;

use tickdispatch_core::{hooks, Dispatcher, DispatcherConfig};
use tickdispatch_host::{init_host, HostError, HostGlobals, HostMode, SharedEnvironment};

// Library metadata - static strings with null terminators for C compatibility
static NAME: &[u8] = b"tickdispatch\0";
static VERSION: &[u8] = b"0.1.0\0";

/// Environment variable controlling the log filter
const LOG_ENV: &str = "TICKDISPATCH_LOG";

/// Host mode pushed in from C
static ENVIRONMENT: LazyLock<Arc<SharedEnvironment>> =
    LazyLock::new(|| Arc::new(SharedEnvironment::default()));

/// C callback queued for the main thread
pub type WorkCallback = extern "C" fn(user_data: *mut c_void);

/// Opaque user pointer handed back to the callback on the main thread
struct UserData(*mut c_void);

// SAFETY: The host guarantees the pointer stays valid until the callback runs
// and only dereferences it from the callback.
unsafe impl Send for UserData {}

impl UserData {
    fn into_inner(self) -> *mut c_void {
        self.0
    }
}

fn mode(editing: bool) -> HostMode {
    if editing {
        HostMode::Editing
    } else {
        HostMode::Playing
    }
}

/// Called when the host loads the library, from the main thread
///
/// # Safety
/// - `error` must be a valid pointer to a buffer of at least `maxlen` bytes, or null
#[no_mangle]
#[instrument(skip_all)]
pub unsafe extern "C" fn tickdispatch_load(editing: bool, error: *mut c_char, maxlen: usize) -> bool {
    let config = match DispatcherConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tickdispatch: using default config ({})", e);
            DispatcherConfig::default()
        }
    };

    // Initialize tracing subscriber
    let default_filter = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    tracing::info!("tickdispatch loading...");

    match init_host(HostGlobals::new("native")) {
        Ok(()) | Err(HostError::AlreadyInitialized) => {}
        Err(e) => {
            tracing::error!("Failed to init host: {}", e);
            write_error(error, maxlen, &format!("Host error: {}", e));
            return false;
        }
    }

    ENVIRONMENT.set_mode(mode(editing));

    let host: Arc<SharedEnvironment> = Arc::clone(&ENVIRONMENT);
    let dispatcher = Arc::new(Dispatcher::new(host).with_config(config));
    if let Err(e) = dispatcher.activate() {
        tracing::error!("Failed to activate dispatcher: {}", e);
        write_error(error, maxlen, &format!("Dispatcher error: {}", e));
        return false;
    }

    tracing::info!("tickdispatch loaded successfully!");
    tracing::info!("Main thread ID: {:?}", std::thread::current().id());

    true
}

/// Called when the host unloads the library
#[no_mangle]
#[instrument(skip_all)]
pub extern "C" fn tickdispatch_unload() -> bool {
    tracing::info!("tickdispatch unloading...");

    match panic::catch_unwind(crate::shutdown) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!("Panic during shutdown");
            false
        }
    }
}

/// Called from the host loop every tick, on the main thread
#[no_mangle]
pub extern "C" fn tickdispatch_tick() {
    // Panics must not unwind into the host
    if panic::catch_unwind(hooks::on_host_tick).is_err() {
        tracing::error!("Panic escaped host tick");
    }
}

/// Switch between edit and live mode
#[no_mangle]
pub extern "C" fn tickdispatch_set_editing(editing: bool) {
    ENVIRONMENT.set_mode(mode(editing));
}

/// Set whether edit-mode sequences run independently of the dispatcher
///
/// Returns `false` when no dispatcher is active.
#[no_mangle]
pub extern "C" fn tickdispatch_set_ownerless(ownerless: bool) -> bool {
    match tickdispatch_core::current() {
        Ok(dispatcher) => {
            dispatcher.set_ownerless(ownerless);
            true
        }
        Err(_) => false,
    }
}

/// Queue a callback to run on the main thread at the next tick
///
/// Safe to call from any thread. Returns `false` when no dispatcher is
/// active or `callback` is null.
#[no_mangle]
pub extern "C" fn tickdispatch_enqueue(callback: Option<WorkCallback>, user_data: *mut c_void) -> bool {
    let Some(callback) = callback else {
        return false;
    };
    let data = UserData(user_data);

    match tickdispatch_core::queue_action(move || callback(data.into_inner())) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Dropping native callback: {}", e);
            false
        }
    }
}

/// Number of work items waiting for the next tick, 0 when inactive
#[no_mangle]
pub extern "C" fn tickdispatch_queued_count() -> usize {
    tickdispatch_core::queued_work_count().unwrap_or(0)
}

// Metadata exports

#[no_mangle]
pub extern "C" fn tickdispatch_get_name() -> *const c_char {
    NAME.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn tickdispatch_get_version() -> *const c_char {
    VERSION.as_ptr() as *const c_char
}

/// Helper to write an error message to a C buffer
///
/// # Safety
/// - `error` must be a valid pointer or null
/// - `maxlen` must accurately reflect the buffer size
unsafe fn write_error(error: *mut c_char, maxlen: usize, msg: &str) {
    if !error.is_null() && maxlen > 0 {
        let bytes = msg.as_bytes();
        let len = bytes.len().min(maxlen - 1);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), error as *mut u8, len);
        *error.add(len) = 0;
    }
}
