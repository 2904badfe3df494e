//! `browse` subcommand: the preset controller driven from the terminal.
//!
//! A reader thread turns stdin lines into encoder events; the main loop
//! polls them, redraws the 20×4 screen and reconnects after a disconnect.

use std::io::{BufRead, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use c4preset_lib::clock::Clock;
use c4preset_lib::input::{Direction, EncoderSignal};
use c4preset_lib::reconnect::{self, ReconnectState};

use super::{
    C4Error, Config, HidTransport, Options, PresetController, RUNNING, Result, SystemClock,
    TextGrid, Transport, controller_for, load_checked_config, open_transport, session,
    stall_timeout,
};

/// One stdin line mapped to encoder input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Turn(Direction),
    Press,
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim() {
        "+" | "n" => Some(Key::Turn(Direction::Clockwise)),
        "-" | "p" => Some(Key::Turn(Direction::CounterClockwise)),
        "" | "s" => Some(Key::Press),
        "q" => Some(Key::Quit),
        _ => None,
    }
}

/// Feed stdin into `signal` until `q` or end of input, then raise `quit`.
fn spawn_stdin_reader(signal: Arc<EncoderSignal>, quit: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_key(&line) {
                Some(Key::Turn(direction)) => signal.record_turn(direction),
                Some(Key::Press) => signal.record_press(),
                Some(Key::Quit) => break,
                None => log::warn!("unknown key {line:?} (use +, -, s or q)"),
            }
        }
        quit.store(true, Ordering::SeqCst);
    });
}

fn keep_running(quit: &AtomicBool) -> bool {
    RUNNING.load(Ordering::SeqCst) && !quit.load(Ordering::SeqCst)
}

/// Terminal rendering of the character grid with a status line below it.
/// Only changed frames are printed.
struct Screen {
    grid: TextGrid,
    status: Option<String>,
    last: String,
    tty: bool,
}

impl Screen {
    fn new() -> Self {
        Screen {
            grid: TextGrid::new(),
            status: None,
            last: String::new(),
            tty: std::io::stdout().is_terminal(),
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// The boxed grid, then the status line if any.
    fn frame(&self) -> String {
        let border = "+--------------------+";
        let mut out = format!("{border}\n");
        for line in self.grid.render().lines() {
            out.push_str(&format!("|{line}|\n"));
        }
        out.push_str(border);
        out.push('\n');
        if let Some(status) = &self.status {
            out.push_str(status);
            out.push('\n');
        }
        out
    }

    fn flush(&mut self) {
        let frame = self.frame();
        if frame == self.last {
            return;
        }
        if self.tty {
            print!("\x1b[2J\x1b[H");
        }
        print!("{frame}");
        self.last = frame;
    }
}

struct Browser<'a> {
    controller: PresetController,
    screen: Screen,
    clock: SystemClock,
    config: &'a Config,
    signal: Arc<EncoderSignal>,
    quit: Arc<AtomicBool>,
}

impl Browser<'_> {
    /// Discover, then poll until quit. Errors mean the device was lost or
    /// discovery stalled.
    fn run_session(&mut self, transport: &mut Transport) -> Result<()> {
        let result = session::discover(
            &mut self.controller,
            transport,
            &mut self.screen.grid,
            &self.clock,
            stall_timeout(self.config),
        );
        self.screen.flush();
        result?;

        loop {
            // Read the flag first so events recorded before a quit still apply.
            let stop = !keep_running(&self.quit);
            session::pump_reports(
                &mut self.controller,
                transport,
                &mut self.screen.grid,
                &self.clock,
                std::time::Duration::ZERO,
            )?;
            let outcome =
                self.controller
                    .poll(self.signal.take(), transport, &mut self.screen.grid)?;
            if let Some(slot) = outcome.program_change {
                self.screen
                    .set_status(format!("Loaded preset {:03}", slot as u16 + 1));
            }
            if outcome.refreshed || outcome.program_change.is_some() {
                self.screen.flush();
            }
            if stop {
                return Ok(());
            }
            self.clock.delay_ms(self.config.poll_interval_ms);
        }
    }

    /// Forget the device and clear stale input reports.
    fn lose_device(&mut self, transport: &mut Transport) {
        self.controller
            .on_unmount(transport.identity(), &mut self.screen.grid);
        self.screen.status = None;
        self.screen.flush();
        while let Ok(Some(_)) = transport.receive_report(std::time::Duration::ZERO) {}
    }
}

pub(super) fn cmd_browse(opts: &Options) -> Result<()> {
    let config = load_checked_config(opts)?;
    let signal = Arc::new(EncoderSignal::new());
    let quit = Arc::new(AtomicBool::new(false));

    let mut browser = Browser {
        controller: controller_for(&config),
        screen: Screen::new(),
        clock: SystemClock::new(),
        config: &config,
        signal: Arc::clone(&signal),
        quit: Arc::clone(&quit),
    };
    browser.controller.show_splash(&mut browser.screen.grid);
    browser.screen.flush();

    let mut transport = Some(open_transport(opts, &config)?);
    spawn_stdin_reader(signal, Arc::clone(&quit));
    let mut backoff = ReconnectState::with_defaults();

    while keep_running(&quit) {
        let Some(dev) = transport.as_mut() else {
            if let Some(dev) =
                reconnect::try_reopen(&mut backoff, &browser.clock, &config.device_serial)
            {
                log::info!("reconnected to {}", dev.info().path);
                transport = Some(Transport::Usb(dev));
            } else {
                browser.clock.delay_ms(config.poll_interval_ms);
            }
            continue;
        };

        match browser.run_session(dev) {
            Ok(()) => break,
            Err(C4Error::Stalled { slot }) => {
                log::warn!("discovery stalled at slot {slot}, restarting");
                browser.lose_device(dev);
            }
            Err(e) if dev.is_simulated() => return Err(e),
            Err(e) => {
                log::warn!("{e}");
                browser.lose_device(dev);
                transport = None;
            }
        }
    }
    Ok(())
}
