use std::time::Duration;
use tokio::time::interval;

use crate::energy_integrator::{MonotonicClock, SystemClock};
use crate::reading_assembler::ReadingAssembler;

/// Polls one counter on a fixed period and publishes each cycle's reading.
///
/// Failed cycles are logged and skipped; the poller shuts itself down after
/// too many consecutive failures. Nothing is retried within a cycle.
pub struct MeterPoller<C: MonotonicClock = SystemClock> {
    assembler: ReadingAssembler<C>,
    period: Duration,
}

impl<C: MonotonicClock + 'static> MeterPoller<C> {
    pub fn new(assembler: ReadingAssembler<C>, period: Duration) -> Self {
        Self { assembler, period }
    }

    /// Spawns the poller in its own isolated task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut poller = self;
            poller.run().await;
        })
    }

    /// Main execution loop for one counter's polling task.
    async fn run(&mut self) {
        let counter = self.assembler.component_info().id.clone();
        println!(
            "Starting poller for counter {} every {:?}",
            counter, self.period
        );

        let mut poll_interval = interval(self.period);
        let mut consecutive_errors = 0u32;
        const MAX_CONSECUTIVE_ERRORS: u32 = 10;

        loop {
            poll_interval.tick().await;

            match self.assembler.update().await {
                Ok(reading) => {
                    consecutive_errors = 0;
                    println!(
                        "Counter {}: {}W, imported {}Wh, exported {}Wh",
                        counter, reading.power, reading.imported, reading.exported
                    );
                }
                Err(e) => {
                    consecutive_errors += 1;
                    println!(
                        "Counter {} update error ({}/{}): {:#}",
                        counter, consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        println!(
                            "Too many consecutive update errors for counter {}. Shutting down poller.",
                            counter
                        );
                        break;
                    }
                }
            }
        }

        println!("Poller for counter {} exiting", counter);
    }
}
