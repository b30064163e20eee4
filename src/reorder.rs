use crate::{common::*, error::Error, lifecycle::WorkerSet, task::Envelope};
use flume::r#async::RecvStream;

/// Ordered, lazy output of [par_map](crate::par_map).
///
/// Yields one `Result` per task, strictly in input order, regardless of
/// completion order. A task panic surfaces as
/// [TaskFailure](Error::TaskFailure) at that task's position without
/// disturbing its neighbors; workers dying early surface as one fused
/// [PipelineFailure](Error::PipelineFailure).
///
/// The iterator suspends (blocking wait, no spinning) while no deliverable
/// result exists. Dropping it before exhaustion cancels the session: workers
/// finish their in-flight task and exit promptly.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ParMap<T> {
    pub(crate) expected: usize,
    pub(crate) total: usize,
    pub(crate) fused: bool,
    #[derivative(Debug = "ignore")]
    pub(crate) buffer: HashMap<usize, Result<T, String>>,
    #[derivative(Debug = "ignore")]
    pub(crate) results: flume::Receiver<Envelope<T>>,
    #[derivative(Debug = "ignore")]
    pub(crate) workers: Option<WorkerSet>,
}

impl<T> ParMap<T> {
    /// Number of results not yet yielded.
    pub fn remaining(&self) -> usize {
        self.total - self.expected
    }

    /// Number of workers still alive; zero once the session has wound down.
    pub fn alive_workers(&self) -> usize {
        self.workers
            .as_ref()
            .map_or(0, |workers| workers.alive_count())
    }

    /// Cancels the session and blocks until every worker has exited.
    ///
    /// Queued tasks are discarded; in-flight tasks run to completion first.
    /// The iterator fuses: no further results are yielded. A wrapping layer
    /// can race the iterator against a timer and call this on expiry.
    pub fn terminate(&mut self) {
        if let Some(workers) = &self.workers {
            workers.terminate();
        }
        self.fused = true;
    }

    /// Converts the blocking iterator into a [Stream](futures::Stream) with
    /// identical ordering and failure semantics, for async consumers.
    pub fn into_stream(self) -> ParMapStream<T>
    where
        T: 'static,
    {
        let Self {
            expected,
            total,
            fused,
            buffer,
            results,
            workers,
        } = self;

        ParMapStream {
            expected,
            total,
            fused,
            buffer,
            workers,
            results: results.into_stream(),
        }
    }

    fn emit(&mut self, outcome: Result<T, String>) -> Result<T, Error> {
        let index = self.expected;
        self.expected += 1;
        outcome.map_err(|message| Error::TaskFailure { index, message })
    }
}

impl<T> Iterator for ParMap<T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused || self.expected == self.total {
            return None;
        }

        if let Some(outcome) = self.buffer.remove(&self.expected) {
            return Some(self.emit(outcome));
        }

        loop {
            match self.results.recv() {
                Ok(Envelope { index, outcome }) => match self.expected.cmp(&index) {
                    Equal => break Some(self.emit(outcome)),
                    Less => {
                        let prev = self.buffer.insert(index, outcome);
                        assert!(prev.is_none(), "index {} delivered more than once", index);
                    }
                    Greater => panic!("index {} delivered more than once", index),
                },
                Err(_) => {
                    // All workers exited and the channel drained, yet results
                    // are missing.
                    self.fused = true;
                    tracing::error!(
                        delivered = self.expected,
                        total = self.total,
                        "workers exited before delivering all results"
                    );
                    break Some(Err(Error::PipelineFailure {
                        delivered: self.expected,
                        total: self.total,
                    }));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.total - self.expected))
    }
}

/// A stream combinator returned from [into_stream()](ParMap::into_stream).
#[derive(Derivative)]
#[derivative(Debug)]
#[pin_project]
pub struct ParMapStream<T>
where
    T: 'static,
{
    expected: usize,
    total: usize,
    fused: bool,
    #[derivative(Debug = "ignore")]
    buffer: HashMap<usize, Result<T, String>>,
    #[derivative(Debug = "ignore")]
    workers: Option<WorkerSet>,
    #[derivative(Debug = "ignore")]
    #[pin]
    results: RecvStream<'static, Envelope<T>>,
}

impl<T> Stream for ParMapStream<T>
where
    T: 'static,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        Ready(loop {
            if *this.fused || *this.expected == *this.total {
                break None;
            }

            if let Some(outcome) = this.buffer.remove(this.expected) {
                break Some(emit(this.expected, outcome));
            }

            match ready!(this.results.as_mut().poll_next(cx)) {
                Some(Envelope { index, outcome }) => match (*this.expected).cmp(&index) {
                    Equal => break Some(emit(this.expected, outcome)),
                    Less => {
                        let prev = this.buffer.insert(index, outcome);
                        assert!(prev.is_none(), "index {} delivered more than once", index);
                    }
                    Greater => panic!("index {} delivered more than once", index),
                },
                None => {
                    *this.fused = true;
                    break Some(Err(Error::PipelineFailure {
                        delivered: *this.expected,
                        total: *this.total,
                    }));
                }
            }
        })
    }
}

fn emit<T>(expected: &mut usize, outcome: Result<T, String>) -> Result<T, Error> {
    let index = *expected;
    *expected += 1;
    outcome.map_err(|message| Error::TaskFailure { index, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    fn fixture<T>(total: usize) -> (flume::Sender<Envelope<T>>, ParMap<T>) {
        let (tx, rx) = utils::channel(None);
        let map = ParMap {
            expected: 0,
            total,
            fused: false,
            buffer: HashMap::new(),
            results: rx,
            workers: None,
        };
        (tx, map)
    }

    #[test]
    fn reorders_out_of_order_envelopes() {
        let (tx, map) = fixture(5);
        for index in [3, 1, 4, 0, 2] {
            tx.send(Envelope {
                index,
                outcome: Ok(index * 10),
            })
            .unwrap();
        }
        drop(tx);

        let values: Vec<_> = map.map(|result| result.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn task_failure_keeps_its_position() {
        let (tx, map) = fixture(3);
        tx.send(Envelope {
            index: 1,
            outcome: Err("boom".to_owned()),
        })
        .unwrap();
        tx.send(Envelope {
            index: 2,
            outcome: Ok(22),
        })
        .unwrap();
        tx.send(Envelope {
            index: 0,
            outcome: Ok(0),
        })
        .unwrap();
        drop(tx);

        let results: Vec<_> = map.collect();
        assert_eq!(results[0], Ok(0));
        assert_eq!(
            results[1],
            Err(Error::TaskFailure {
                index: 1,
                message: "boom".to_owned()
            })
        );
        assert_eq!(results[2], Ok(22));
    }

    #[test]
    fn missing_results_surface_pipeline_failure_then_fuse() {
        let (tx, mut map) = fixture(3);
        tx.send(Envelope {
            index: 0,
            outcome: Ok(0),
        })
        .unwrap();
        tx.send(Envelope {
            index: 2,
            outcome: Ok(22),
        })
        .unwrap();
        drop(tx);

        assert_eq!(map.next(), Some(Ok(0)));
        assert_eq!(
            map.next(),
            Some(Err(Error::PipelineFailure {
                delivered: 1,
                total: 3
            }))
        );
        assert_eq!(map.next(), None);
        assert_eq!(map.next(), None);
    }

    #[tokio::test]
    async fn stream_matches_iterator_semantics() {
        let (tx, map) = fixture(4);
        for index in [2, 0, 3, 1] {
            tx.send(Envelope {
                index,
                outcome: Ok(index),
            })
            .unwrap();
        }
        drop(tx);

        let values: Vec<_> = map
            .into_stream()
            .map(|result| result.unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn stream_reports_pipeline_failure() {
        let (tx, map) = fixture::<u32>(2);
        drop(tx);

        let results: Vec<_> = map.into_stream().collect().await;
        assert_eq!(
            results,
            vec![Err(Error::PipelineFailure {
                delivered: 0,
                total: 2
            })]
        );
    }
}
