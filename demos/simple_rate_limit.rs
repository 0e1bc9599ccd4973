//! Simple example driving the rate-limited operator from a producer thread.

use otap_df_ratelimit::{
    validate_limiter_name, DownstreamSubscription, Error, RateLimitedOperator, RateLimiter,
    RateLimiterConfig, UpstreamHandle, UpstreamListener,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Demand and cancellation travel from the consumer to the producer thread.
enum Command {
    Request(u64),
    Cancel,
}

struct ChannelSubscription {
    commands: flume::Sender<Command>,
}

impl DownstreamSubscription for ChannelSubscription {
    fn request(&self, n: u64) {
        let _ = self.commands.send(Command::Request(n));
    }

    fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }
}

/// Hands out a fixed number of permits and then refuses.
struct QuotaLimiter {
    name: String,
    config: RateLimiterConfig,
    remaining: AtomicUsize,
}

impl QuotaLimiter {
    fn new(name: &str, permits: usize) -> Result<Self, Error> {
        validate_limiter_name(name)?;
        Ok(Self {
            name: name.to_string(),
            config: RateLimiterConfig::default().with_timeout_duration(Duration::from_millis(10)),
            remaining: AtomicUsize::new(permits),
        })
    }
}

impl RateLimiter for QuotaLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn try_acquire(&self, _timeout: Duration) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Default)]
struct PrintingConsumer {
    subscription: Mutex<Option<UpstreamHandle>>,
}

impl PrintingConsumer {
    fn request(&self, n: u64) {
        let subscription = self.subscription.lock().ok().and_then(|s| s.clone());
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }
}

impl UpstreamListener<u64, Error> for PrintingConsumer {
    fn on_subscribe(&self, handle: UpstreamHandle) {
        println!("subscribed");
        if let Ok(mut slot) = self.subscription.lock() {
            *slot = Some(handle);
        }
        self.request(1);
    }

    fn on_next(&self, item: u64) {
        println!("  event {item}");
        self.request(1);
    }

    fn on_error(&self, error: Error) {
        println!("stream failed: {error}");
    }

    fn on_complete(&self) {
        println!("stream completed");
    }
}

type Operator = RateLimitedOperator<QuotaLimiter, Arc<PrintingConsumer>>;

fn produce(operator: &Operator, total: u64) {
    let (tx, rx) = flume::unbounded();
    UpstreamListener::<u64, Error>::on_subscribe(
        operator,
        Arc::new(ChannelSubscription { commands: tx }),
    );

    let mut next = 0;
    let mut demand = 0u64;
    while let Ok(command) = rx.recv() {
        match command {
            Command::Request(n) => demand = demand.saturating_add(n),
            Command::Cancel => {
                println!("producer: cancelled after {next} events");
                return;
            }
        }
        while demand > 0 && next < total {
            UpstreamListener::<u64, Error>::on_next(operator, next);
            next += 1;
            demand -= 1;
        }
        if next == total {
            UpstreamListener::<u64, Error>::on_complete(operator);
            return;
        }
    }
}

fn main() {
    println!("Rate Limited Operator Example");
    println!("=============================");

    // Five permits: one for the bind handshake (which also covers the first
    // event) and one for each of the next four events.
    let limiter = match QuotaLimiter::new("demo", 5) {
        Ok(limiter) => limiter,
        Err(e) => {
            eprintln!("Failed to create limiter: {}", e);
            return;
        }
    };

    let consumer = Arc::new(PrintingConsumer::default());
    let operator = Arc::new(RateLimitedOperator::new(limiter, Arc::clone(&consumer)));

    let producer = {
        let operator = Arc::clone(&operator);
        thread::spawn(move || produce(&operator, 10))
    };
    if producer.join().is_err() {
        eprintln!("producer thread panicked");
    }

    println!("\nFinal state: {:?}", operator);
}
