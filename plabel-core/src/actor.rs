use std::{
    fmt::Display,
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

pub enum Act<T: Actor> {
    Continue,
    /// Wait for the next message, but no longer than `deadline`.  If nothing
    /// arrives in time, `timeout_msg` is handled instead.
    WaitUntil {
        deadline: Instant,
        timeout_msg: T::Message,
    },
    Shutdown,
}

/// Single-threaded message loop.  Messages are handled one at a time, in
/// arrival order, each running to completion before the next one is received.
pub trait Actor: Sized {
    type Message: Send + 'static;
    type Error: Display;

    fn handle(&mut self, msg: Self::Message) -> Result<Act<Self>, Self::Error>;

    fn process(mut self, recv: Receiver<Self::Message>) {
        let mut act = Act::Continue;
        loop {
            let msg = match act {
                Act::Continue => match recv.recv() {
                    Ok(msg) => msg,
                    Err(_) => {
                        break;
                    }
                },
                Act::WaitUntil {
                    deadline,
                    timeout_msg,
                } => match recv.recv_deadline(deadline) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => timeout_msg,
                    Err(RecvTimeoutError::Disconnected) => {
                        break;
                    }
                },
                Act::Shutdown => {
                    break;
                }
            };
            act = match self.handle(msg) {
                Ok(act) => act,
                Err(err) => {
                    log::error!("error: {}", err);
                    break;
                }
            };
        }
    }

    /// Run the actor on its own thread.  `factory` receives a sender for the
    /// actor's own mailbox, so it can hand it out to collaborators.
    fn spawn<F>(factory: F) -> ActorHandle<Self::Message>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        let (send, recv) = unbounded();
        ActorHandle {
            sender: send.clone(),
            thread: thread::spawn(move || {
                factory(send).process(recv);
            }),
        }
    }
}

pub struct ActorHandle<M> {
    thread: JoinHandle<()>,
    sender: Sender<M>,
}

impl<M> ActorHandle<M> {
    pub fn sender(&self) -> Sender<M> {
        self.sender.clone()
    }

    pub fn join(self) {
        let _ = self.thread.join();
    }
}
