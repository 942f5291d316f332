// Text panel that redraws the latest snapshot on a terminal
use crate::application::display::{DisplayError, DisplayPanel, Snapshot};
use std::io::Write;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub struct ConsolePanel<W> {
    out: W,
}

impl<W: Write + Send> ConsolePanel<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> DisplayPanel for ConsolePanel<W> {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), DisplayError> {
        let updated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(self.out, "{}", CLEAR_SCREEN)?;
        writeln!(self.out, "Updated {}", updated)?;
        for line in &snapshot.lines {
            let value = format!("{:.*}", line.precision, line.value);
            if line.unit.is_empty() {
                writeln!(self.out, "{}: {}", line.label, value)?;
            } else {
                writeln!(self.out, "{}: {} {}", line.label, value, line.unit)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn blank(&mut self) -> Result<(), DisplayError> {
        write!(self.out, "{}", CLEAR_SCREEN)?;
        self.out.flush()?;
        Ok(())
    }
}
