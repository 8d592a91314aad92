//! The matching thread
//!
//! One dedicated OS thread owns the [`OrderBook`] outright; nothing else
//! ever touches it. Each client connection hands the thread a [`Lane`]: the
//! consumer end of its request ring plus the sender for its responses. The
//! thread drains the lanes round-robin, one request per lane per pass, so a
//! chatty client cannot starve the others. Within one lane, responses are
//! produced in the order requests were pushed.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use common::ConnectionId;
use observability::EngineMetrics;
use orderbook::{BookError, OrderBook};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{self, Request, StatusCode};

/// Sleep between passes when every lane came up empty
const IDLE_BACKOFF: Duration = Duration::from_micros(50);

/// What the dispatcher sends back to a connection's writer task
#[derive(Debug)]
pub enum Outbound {
    /// Write this response and keep the connection open
    Frame(Bytes),
    /// Write this response, then close the connection
    Close(Bytes),
}

/// One client's lanes into and out of the matching thread
pub struct Lane {
    pub conn_id: ConnectionId,
    /// Consumer end of the connection's request ring
    pub requests: spsc::Consumer<Bytes>,
    /// Sender feeding the connection's writer task
    pub responses: tokio::sync::mpsc::UnboundedSender<Outbound>,
}

/// The matching thread's state: the book and the set of live lanes
pub struct Dispatcher {
    book: OrderBook,
    lanes: Vec<Lane>,
    registry: mpsc::Receiver<Lane>,
    shutdown: CancellationToken,
    metrics: EngineMetrics,
}

impl Dispatcher {
    pub fn new(registry: mpsc::Receiver<Lane>, shutdown: CancellationToken) -> Self {
        Self {
            book: OrderBook::new(),
            lanes: Vec::new(),
            registry,
            shutdown,
            metrics: EngineMetrics::new(),
        }
    }

    /// Spawn the matching thread
    pub fn spawn(
        registry: mpsc::Receiver<Lane>,
        shutdown: CancellationToken,
    ) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
            .name("matching".to_string())
            .spawn(move || Dispatcher::new(registry, shutdown).run())
            .expect("spawn matching thread")
    }

    /// Drain lanes until shutdown
    pub fn run(mut self) {
        info!("Matching thread started");

        while !self.shutdown.is_cancelled() {
            while let Ok(lane) = self.registry.try_recv() {
                debug!(conn_id = lane.conn_id, "Lane registered");
                self.lanes.push(lane);
            }

            let mut busy = false;
            let mut dead: Vec<usize> = Vec::new();

            for index in 0..self.lanes.len() {
                match self.lanes[index].requests.try_pop() {
                    Some(message) => {
                        busy = true;
                        let (response, close) = self.handle_message(&message);

                        let outbound = if close {
                            Outbound::Close(response)
                        } else {
                            Outbound::Frame(response)
                        };
                        if self.lanes[index].responses.send(outbound).is_err() || close {
                            dead.push(index);
                        }
                    }
                    None => {
                        if self.lanes[index].responses.is_closed() {
                            dead.push(index);
                        }
                    }
                }
            }

            for index in dead.into_iter().rev() {
                let lane = self.lanes.swap_remove(index);
                debug!(conn_id = lane.conn_id, "Lane dropped");
            }

            if !busy {
                std::thread::park_timeout(IDLE_BACKOFF);
            }
        }

        info!(
            resting_orders = self.book.resting_orders(),
            "Matching thread stopped"
        );
    }

    /// Handle one raw request payload. Returns the encoded response and
    /// whether the connection should be closed afterwards.
    fn handle_message(&mut self, payload: &[u8]) -> (Bytes, bool) {
        let started = Instant::now();

        let result = match codec::decode_request(payload) {
            Ok(request) => (self.dispatch(request), false),
            Err(e) => {
                warn!(%e, "Undecodable request payload");
                (codec::encode_response(StatusCode::SystemError, &[]), true)
            }
        };

        self.metrics.record_request(started.elapsed());
        result
    }

    /// Invoke the book and encode the outcome
    fn dispatch(&mut self, request: Request) -> Bytes {
        match request {
            Request::Add {
                side,
                order_type,
                price,
                quantity,
            } => match self.book.add(quantity, price, order_type, side) {
                Ok(result) => {
                    if !result.is_admitted() {
                        self.metrics.record_rejection();
                    } else if result.has_trades() {
                        self.metrics.record_trades(result.trades.len());
                    }
                    codec::encode_response(StatusCode::Success, &codec::encode_add_payload(&result))
                }
                Err(error) => self.book_error_response(error),
            },

            Request::Cancel { order_id } => match self.book.cancel(order_id) {
                Ok(()) => codec::encode_response(
                    StatusCode::Success,
                    &codec::encode_tag_payload(codec::result_tag::OK),
                ),
                Err(error) => self.book_error_response(error),
            },

            Request::Modify { order_id, changes } => match self.book.modify(order_id, changes) {
                Ok(result) => {
                    if !result.is_admitted() {
                        self.metrics.record_rejection();
                    } else if result.has_trades() {
                        self.metrics.record_trades(result.trades.len());
                    }
                    codec::encode_response(StatusCode::Success, &codec::encode_add_payload(&result))
                }
                Err(error) => self.book_error_response(error),
            },

            Request::Best { side } => {
                let price = if side.is_buy() {
                    self.book.best_bid()
                } else {
                    self.book.best_ask()
                };
                codec::encode_response(StatusCode::Success, &codec::encode_best_payload(price))
            }

            Request::Depth { side } => {
                let levels = if side.is_sell() {
                    self.book.full_depth_ask()
                } else {
                    self.book.full_depth_bid()
                };
                codec::encode_response(StatusCode::Success, &codec::encode_depth_payload(&levels))
            }
        }
    }

    /// Book-level rejections are well-formed outcomes, so they ride inside
    /// a 200 as a payload tag.
    fn book_error_response(&self, error: BookError) -> Bytes {
        let tag = match error {
            BookError::UnknownOrder(_) => codec::result_tag::UNKNOWN_ORDER,
            BookError::InvalidQuantity => codec::result_tag::INVALID_QUANTITY,
            BookError::InvalidFill { .. } => codec::result_tag::INVALID_QUANTITY,
        };
        codec::encode_response(StatusCode::Success, &codec::encode_tag_payload(tag))
    }
}
