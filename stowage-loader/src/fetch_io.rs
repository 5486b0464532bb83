use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadResult};
use crate::loader::{FetchPayload, FetchRequest, LoaderEvent, LoaderIO};
use crossbeam_channel::{Receiver, Sender};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

enum ReadOutcome {
    Complete(Vec<u8>),
    Cancelled,
}

// Shared by every worker in a pool
#[derive(Clone)]
struct FetchContext {
    chunk_size: usize,
    result_tx: Sender<LoaderEvent>,
    // Set when the pool is dropped, workers stop at the next chunk
    shutting_down: Arc<AtomicBool>,
}

impl FetchContext {
    fn is_abandoned(
        &self,
        request: &FetchRequest,
    ) -> bool {
        request.cancel.is_cancelled() || self.shutting_down.load(Ordering::Acquire)
    }
}

// Reads in fixed-size chunks so cancellation and progress are noticed between chunks
fn read_chunked(
    reader: &mut dyn Read,
    expected_length: Option<u64>,
    request: &FetchRequest,
    context: &FetchContext,
) -> LoadResult<ReadOutcome> {
    let mut data = Vec::with_capacity(expected_length.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; context.chunk_size.max(1)];

    loop {
        if context.is_abandoned(request) {
            return Ok(ReadOutcome::Cancelled);
        }

        let read_count = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read_count) => read_count,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        data.extend_from_slice(&chunk[..read_count]);

        if let Some(expected_length) = expected_length.filter(|x| *x > 0) {
            let progress = (data.len() as f64 / expected_length as f64).min(1.0) as f32;
            let _ = context.result_tx.send(LoaderEvent::FetchProgress {
                load_handle: request.load_handle,
                generation: request.generation,
                progress,
            });
        }
    }

    Ok(ReadOutcome::Complete(data))
}

fn fetch_file(
    request: &FetchRequest,
    context: &FetchContext,
) -> LoadResult<ReadOutcome> {
    profiling::scope!("fetch_file");
    let path = request.url.to_file_path().map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a valid file path", request.url),
        )
    })?;

    let mut file = std::fs::File::open(&path)?;
    let expected_length = file.metadata().ok().map(|metadata| metadata.len());
    read_chunked(&mut file, expected_length, request, context)
}

fn fetch_http(
    request: &FetchRequest,
    context: &FetchContext,
) -> LoadResult<ReadOutcome> {
    profiling::scope!("fetch_http");
    // Connecting and waiting for headers can't be interrupted, the timeout bounds it
    let agent = ureq::AgentBuilder::new().timeout(request.timeout).build();
    let response = agent.get(request.url.as_str()).call()?;

    if !(200..300).contains(&response.status()) {
        return Err(LoadError::HttpStatus(response.status()));
    }

    let expected_length = response
        .header("Content-Length")
        .and_then(|length| length.parse::<u64>().ok());
    let mut reader = response.into_reader();
    read_chunked(&mut reader, expected_length, request, context)
}

fn fetch(
    request: &FetchRequest,
    context: &FetchContext,
) -> LoadResult<ReadOutcome> {
    if context.is_abandoned(request) {
        return Ok(ReadOutcome::Cancelled);
    }

    match request.url.scheme() {
        "file" => fetch_file(request, context),
        "http" | "https" => fetch_http(request, context),
        scheme => Err(LoadError::UnsupportedScheme(scheme.to_string())),
    }
}

// Takes jobs out of the request channel until the finish channel is signalled
struct FetchWorkerThread {
    finish_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

impl FetchWorkerThread {
    fn new(
        request_rx: Receiver<FetchRequest>,
        context: FetchContext,
        thread_index: usize,
    ) -> LoadResult<Self> {
        let (finish_tx, finish_rx) = crossbeam_channel::bounded(1);
        let join_handle = std::thread::Builder::new()
            .name(format!("Fetch Thread {}", thread_index))
            .spawn(move || {
                profiling::register_thread!(&format!("FetchWorkerThread {}", thread_index));
                loop {
                    crossbeam_channel::select! {
                        recv(request_rx) -> msg => {
                            let request = match msg {
                                Ok(request) => request,
                                // The pool is gone
                                Err(_) => return,
                            };

                            log::trace!("Start fetch {:?} {}", request.load_handle, request.url);
                            let result = match fetch(&request, &context) {
                                Ok(ReadOutcome::Cancelled) => {
                                    log::trace!(
                                        "Fetch cancelled {:?} {}",
                                        request.load_handle,
                                        request.url
                                    );
                                    None
                                }
                                Ok(ReadOutcome::Complete(data)) => {
                                    Some(Ok(Some(FetchPayload { data })))
                                }
                                Err(e) => Some(Err(e)),
                            };

                            if let Some(result) = result {
                                let _ = context.result_tx.send(LoaderEvent::FetchComplete {
                                    load_handle: request.load_handle,
                                    generation: request.generation,
                                    result,
                                });
                            }
                        },
                        recv(finish_rx) -> _msg => {
                            return;
                        }
                    }
                }
            })?;

        Ok(FetchWorkerThread {
            finish_tx,
            join_handle,
        })
    }
}

// Spans N threads, proxies messages to/from them, and kills the threads when the pool is dropped
struct FetchThreadPool {
    worker_threads: Vec<FetchWorkerThread>,
    request_tx: Sender<FetchRequest>,
    shutting_down: Arc<AtomicBool>,
}

impl FetchThreadPool {
    fn new(
        thread_count: usize,
        chunk_size: usize,
        result_tx: Sender<LoaderEvent>,
    ) -> LoadResult<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<FetchRequest>();
        let context = FetchContext {
            chunk_size,
            result_tx,
            shutting_down: Arc::new(AtomicBool::new(false)),
        };

        let mut worker_threads = Vec::with_capacity(thread_count);
        for thread_index in 0..thread_count.max(1) {
            let worker = FetchWorkerThread::new(request_rx.clone(), context.clone(), thread_index)?;
            worker_threads.push(worker);
        }

        Ok(FetchThreadPool {
            request_tx,
            worker_threads,
            shutting_down: context.shutting_down,
        })
    }

    fn add_request(
        &self,
        request: FetchRequest,
    ) {
        if let Err(e) = self.request_tx.send(request) {
            log::error!("Fetch pool is shut down, dropping {:?}", e.0.load_handle);
        }
    }

    fn finish(self) {
        // Queued requests are skipped and reads in progress stop at their next chunk
        self.shutting_down.store(true, Ordering::Release);
        for worker_thread in &self.worker_threads {
            let _ = worker_thread.finish_tx.send(());
        }

        for worker_thread in self.worker_threads {
            if worker_thread.join_handle.join().is_err() {
                log::error!("Fetch thread panicked");
            }
        }
    }
}

/// Fetches `file://` and `http(s)://` URLs on a pool of worker threads
pub struct DefaultLoaderIO {
    thread_pool: Option<FetchThreadPool>,
}

impl DefaultLoaderIO {
    pub fn new(
        config: &LoaderConfig,
        result_tx: Sender<LoaderEvent>,
    ) -> LoadResult<Self> {
        let thread_pool =
            FetchThreadPool::new(config.io_thread_count, config.read_chunk_size, result_tx)?;
        log::debug!(
            "Started {} fetch threads",
            thread_pool.worker_threads.len()
        );

        Ok(DefaultLoaderIO {
            thread_pool: Some(thread_pool),
        })
    }
}

/// Joins the worker threads. A worker still connecting to a server or waiting for its response
/// headers finishes that call first, which can take up to the request's timeout.
impl Drop for DefaultLoaderIO {
    fn drop(&mut self) {
        if let Some(thread_pool) = self.thread_pool.take() {
            thread_pool.finish();
        }
    }
}

impl LoaderIO for DefaultLoaderIO {
    fn request_fetch(
        &self,
        request: FetchRequest,
    ) {
        if let Some(thread_pool) = &self.thread_pool {
            thread_pool.add_request(request);
        }
    }
}
