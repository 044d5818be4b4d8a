use rocket::tokio::sync::mpsc;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct HealthMonitor {
    sender: mpsc::UnboundedSender<String>,
}

impl HealthMonitor {
    /// Exits the process when a task that reported once stays silent for longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

        rocket::tokio::spawn(async move {
            let mut map: HashMap<String, Instant> = HashMap::new();
            let mut interval = rocket::tokio::time::interval(Duration::from_secs(15));
            loop {
                rocket::tokio::select! {
                    _ = interval.tick() => {
                        if let Some(task_name) = stale_task(&map, timeout) {
                            let message = format!(
                                "🚨 No health reports for {} for {} minutes - shutting down application",
                                task_name,
                                timeout.as_secs() / 60
                            );
                            tracing::error!("{message}");
                            // Let the telegram layer flush before the supervisor restarts us
                            rocket::tokio::time::sleep(Duration::from_secs(2)).await;
                            std::process::exit(1);
                        }
                    }
                    Some(task_name) = receiver.recv() => {
                        map.insert(task_name, Instant::now());
                    }
                }
            }
        });

        Self { sender }
    }

    pub fn im_alive(&self, task_name: &str) {
        let _ = self.sender.send(task_name.to_string());
    }
}

fn stale_task(map: &HashMap<String, Instant>, timeout: Duration) -> Option<&str> {
    map.iter()
        .find(|(_, last_heartbeat)| last_heartbeat.elapsed() > timeout)
        .map(|(task_name, _)| task_name.as_str())
}
