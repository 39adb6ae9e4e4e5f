#![allow(dead_code)]

use atmbank::domain::notification::{Notification, NotificationKind};
use atmbank::domain::ports::NotificationSink;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Mutex;

/// Sink that keeps every notification it receives.
#[derive(Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Notification>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) -> bool {
        self.seen.lock().unwrap().push(notification);
        true
    }
}

impl RecordingSink {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.all().into_iter().map(|n| n.kind).collect()
    }

    pub fn last(&self) -> Notification {
        self.all().last().cloned().expect("no notifications")
    }
}

/// Writes a script where each of `terminals` owners deposits `deposits` times.
pub fn generate_script(path: &Path, terminals: u16, deposits: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["action", "terminal", "owner", "amount", "pin", "account"])?;

    for t in 1..=terminals {
        let owner = format!("owner{t}");
        wtr.write_record(["provision", "", &owner, "0", "", ""])?;
    }
    for t in 1..=terminals {
        let label = t.to_string();
        let owner = format!("owner{t}");
        wtr.write_record(["insert", &label, &owner, "", "8888", ""])?;
        wtr.write_record(["select", &label, "", "", "", "0"])?;
        for _ in 0..deposits {
            wtr.write_record(["deposit", &label, "", "1", "", ""])?;
        }
        wtr.write_record(["eject", &label, "", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
