use cryptarch::{
    filter_result, Attempts, Consumer, ConsumerControl, MemorySink, Producer, Storage, StoreConfig,
    StoreError,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

// Stand-in for running `uptime`: three load averages that drift a little each call
fn fake_uptime() -> impl FnMut(&str) -> Result<String, StoreError> + Send {
    let mut tick = 0u32;
    move |_query| {
        tick += 1;
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::Source(e.to_string()))?
            .subsec_millis();
        let load = |scale: f64| (f64::from(seed % 100) / 100.0 + f64::from(tick) * 0.01) * scale;
        Ok(format!("{:.2} {:.2} {:.2}\n", load(1.0), load(0.8), load(0.6)))
    }
}

fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let config = StoreConfig {
        retain_history: true,
        prometheus_namespace: Some("cryptarch demo".to_string()),
        ..StoreConfig::load(None)?
    };
    println!("Creating store (history window {})", config.history_window);
    let storage = Arc::new(Storage::with_config(config)?);

    let exporter = Arc::new(MemorySink::new());
    storage.add_external_storage(exporter.clone());

    let labels: Vec<String> = ["load1", "load5", "load15"].iter().map(|s| s.to_string()).collect();
    storage.put_labels("uptime", labels.clone());

    // Start a producer with a short delay between runs.
    let producer = Producer::new(Arc::clone(&storage), "uptime", fake_uptime())
        .with_attempts(Attempts::Count(10))
        .with_delay(Duration::from_millis(200));
    let producer_control = producer.control();
    let producer_handle = producer.spawn();

    // A consumer that only shows the 1- and 15-minute averages.
    let consumer_control = Arc::new(ConsumerControl::new());
    let mut consumer = Consumer::new(Arc::clone(&storage), "uptime", Arc::clone(&consumer_control));
    let filters = vec!["load1".to_string(), "load15".to_string()];
    let consumer_handle = thread::spawn(move || {
        consumer.run(|result| match filter_result("uptime", result, &labels, &filters) {
            Ok(filtered) => {
                let shown: Vec<String> = filtered.values.iter().map(ToString::to_string).collect();
                println!("{} {}", filtered.time, shown.join(" "));
            }
            Err(e) => eprintln!("filter failed: {}", e),
        })
    });

    // Pause the display for a moment; the producer keeps going.
    thread::sleep(Duration::from_millis(700));
    println!("-- display paused --");
    consumer_control.pause();
    thread::sleep(Duration::from_millis(600));
    consumer_control.resume();
    println!("-- display resumed --");

    let stored = producer_handle.join().unwrap_or_default();
    producer_control.interrupt();
    thread::sleep(Duration::from_millis(100));
    consumer_control.interrupt();
    let shown = consumer_handle.join().unwrap_or_default();

    println!("Producer stored {} results, consumer showed {}", stored, shown);
    println!("Exporter received {} results", exporter.records().len());
    if let Some(prometheus) = storage.prometheus_sink() {
        println!("Prometheus exposition:\n{}", prometheus.render());
    }

    storage.close()
}
