use crate::core::accept::AcceptPolicy;
use crate::core::delivery::ResultSink;
use crate::core::error::WorkflowError;
use crate::core::events::{NoticeLevel, WorkflowEvent};
use crate::core::model::*;
use crate::core::naming::{page_name, replace_extension};
use crate::plugins::registry::{Combiner, Transform};
use anyhow::Context;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct EnqueueReport {
    pub accepted: usize,
    pub rejected: Vec<WorkflowError>,
}

/// Ordered queue of inputs for one tool, plus the outcome of its last batch.
///
/// Items run strictly one after another; a failing item is recorded and the batch
/// moves on. Queue mutation needs `&mut self`, so it cannot happen during a run.
pub struct BatchWorkflow {
    accept: AcceptPolicy,
    limits: WorkflowLimits,
    files: Vec<InputFile>,
    statuses: Vec<ItemStatus>,
    results: Vec<ConversionResult>,
    state: BatchState,
    event_tx: broadcast::Sender<WorkflowEvent>,
}

impl BatchWorkflow {
    pub fn new(accept: AcceptPolicy, limits: WorkflowLimits) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            accept,
            limits,
            files: vec![],
            statuses: vec![],
            results: vec![],
            state: BatchState::Idle,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    pub fn statuses(&self) -> &[ItemStatus] {
        &self.statuses
    }

    pub fn results(&self) -> &[ConversionResult] {
        &self.results
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    fn emit(&self, evt: WorkflowEvent) {
        let _ = self.event_tx.send(evt);
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(WorkflowEvent::Notice { level, message: message.into() });
    }

    fn set_status(&mut self, index: usize, status: ItemStatus) {
        self.statuses[index] = status.clone();
        self.emit(WorkflowEvent::ItemStatusChanged {
            item_id: self.files[index].id,
            index,
            status,
        });
    }

    pub fn enqueue(&mut self, incoming: impl IntoIterator<Item = InputFile>) -> EnqueueReport {
        let mut report = EnqueueReport::default();

        for file in incoming {
            if let Err(reason) = self.accept.check(&file) {
                let err = WorkflowError::RejectedInput { name: file.name.clone(), reason };
                debug!(file = %file.name, "rejected: {}", err);
                self.notice(NoticeLevel::Warn, err.to_string());
                report.rejected.push(err);
                continue;
            }

            let index = self.files.len();
            self.emit(WorkflowEvent::ItemAdded {
                item_id: file.id,
                index,
                name: file.name.clone(),
                size: file.size(),
            });
            self.files.push(file);
            self.statuses.push(ItemStatus::Waiting);
            report.accepted += 1;
        }

        if report.accepted == 0 && !report.rejected.is_empty() && !self.accept.hint.is_empty() {
            self.notice(NoticeLevel::Warn, self.accept.hint.clone());
        } else if report.accepted > 0 {
            self.notice(NoticeLevel::Info, format!("{} file(s) added", report.accepted));
        }
        report
    }

    pub fn remove(&mut self, index: usize) -> Result<InputFile, WorkflowError> {
        if index >= self.files.len() {
            let err = WorkflowError::IndexOutOfRange { index, len: self.files.len() };
            self.notice(NoticeLevel::Warn, err.to_string());
            return Err(err);
        }
        let file = self.files.remove(index);
        self.statuses.remove(index);
        self.emit(WorkflowEvent::ItemRemoved { item_id: file.id, index });
        Ok(file)
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.statuses.clear();
        self.results.clear();
        self.emit(WorkflowEvent::Cleared);
    }

    fn begin(&mut self, batch_id: BatchId) {
        self.results.clear();
        self.statuses = vec![ItemStatus::Waiting; self.files.len()];
        self.state = BatchState::Running;
        self.emit(WorkflowEvent::BatchStateChanged { batch_id: Some(batch_id), state: BatchState::Running });
    }

    fn finish(&mut self, batch_id: BatchId, summary: BatchSummary) {
        self.state = BatchState::Idle;
        self.emit(WorkflowEvent::BatchStateChanged { batch_id: Some(batch_id), state: BatchState::Idle });
        info!(batch = %batch_id, done = summary.done, failed = summary.failed, "batch finished");
    }

    /// Runs `transform` over every queued file in order.
    ///
    /// Only a failing `prepare` is an error; per-item failures end up as `Failed` statuses.
    pub async fn run_all(
        &mut self,
        config: &ConversionConfig,
        transform: &dyn Transform,
    ) -> Result<BatchSummary, WorkflowError> {
        let config = config.clone();

        if let Err(e) = transform.prepare(&config).await {
            let err = WorkflowError::BatchSetup(format!("{}: {:#}", transform.name(), e));
            warn!("{}", err);
            self.notice(NoticeLevel::Error, err.to_string());
            return Err(err);
        }

        let batch_id = Uuid::new_v4();
        info!(batch = %batch_id, items = self.files.len(), transform = transform.name(), "batch started");
        self.begin(batch_id);

        let mut summary = BatchSummary::default();
        for i in 0..self.files.len() {
            self.set_status(i, ItemStatus::Processing);
            let input = self.files[i].clone();
            debug!(batch = %batch_id, index = i, file = %input.name, "processing");

            match transform.transform(&input, &config).await {
                Ok(output) => {
                    let size_bytes = output.total_size();
                    self.push_results(i, &input.name, output);
                    let saved = saved_percent(input.size(), size_bytes);
                    self.set_status(i, ItemStatus::Done { size_bytes, saved_percent: saved });
                    summary.done += 1;
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(batch = %batch_id, index = i, file = %input.name, "item failed: {}", reason);
                    self.set_status(i, ItemStatus::Failed { reason });
                    summary.failed += 1;
                }
            }
        }

        self.finish(batch_id, summary);
        if summary.failed == 0 {
            self.notice(NoticeLevel::Info, format!("all {} file(s) converted", summary.done));
        } else {
            self.notice(
                NoticeLevel::Warn,
                format!("{} converted, {} failed", summary.done, summary.failed),
            );
        }
        Ok(summary)
    }

    fn push_results(&mut self, source_index: usize, input_name: &str, output: TransformOutput) {
        match output {
            TransformOutput::Single { data, ext } => self.results.push(ConversionResult {
                source_index,
                name: replace_extension(input_name, &ext),
                data,
            }),
            TransformOutput::Renamed { data, name } => {
                self.results.push(ConversionResult { source_index, name, data })
            }
            TransformOutput::Pages { pages, ext } => {
                for (n, data) in pages.into_iter().enumerate() {
                    self.results.push(ConversionResult {
                        source_index,
                        name: page_name(input_name, n + 1, &ext),
                        data,
                    });
                }
            }
        }
    }

    /// Feeds the whole queue to `combiner` and keeps its single output.
    pub async fn run_combined(
        &mut self,
        config: &ConversionConfig,
        combiner: &dyn Combiner,
    ) -> Result<BatchSummary, WorkflowError> {
        let config = config.clone();
        let required = combiner.min_inputs();
        if self.files.len() < required {
            let err = WorkflowError::NotEnoughInputs { required, actual: self.files.len() };
            self.notice(NoticeLevel::Warn, err.to_string());
            return Err(err);
        }

        let batch_id = Uuid::new_v4();
        info!(batch = %batch_id, items = self.files.len(), combiner = combiner.name(), "combined batch started");
        self.begin(batch_id);
        for i in 0..self.files.len() {
            self.set_status(i, ItemStatus::Processing);
        }

        let n = self.files.len();
        let summary = match combiner.combine(&self.files, &config).await {
            Ok(data) => {
                let size_bytes = data.len() as u64;
                let input_total: u64 = self.files.iter().map(InputFile::size).sum();
                self.results.push(ConversionResult { source_index: 0, name: combiner.output_name(), data });
                let saved = saved_percent(input_total, size_bytes);
                for i in 0..n {
                    self.set_status(i, ItemStatus::Done { size_bytes, saved_percent: saved });
                }
                self.notice(NoticeLevel::Info, format!("{} file(s) combined", n));
                BatchSummary { done: n, failed: 0 }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(batch = %batch_id, "combine failed: {}", reason);
                for i in 0..n {
                    self.set_status(i, ItemStatus::Failed { reason: reason.clone() });
                }
                self.notice(NoticeLevel::Error, format!("{} failed: {}", combiner.name(), reason));
                BatchSummary { done: 0, failed: n }
            }
        };

        self.finish(batch_id, summary);
        Ok(summary)
    }

    /// Hands every result to `sink` in result order, pausing between deliveries.
    pub async fn download_all(&self, sink: &dyn ResultSink) -> anyhow::Result<Vec<PathBuf>> {
        let mut delivered = Vec::with_capacity(self.results.len());
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 && !self.limits.delivery_delay.is_zero() {
                tokio::time::sleep(self.limits.delivery_delay).await;
            }
            let path = sink
                .deliver(result)
                .await
                .with_context(|| format!("deliver {}", result.name))?;
            self.emit(WorkflowEvent::Delivered { name: result.name.clone(), path: path.clone() });
            delivered.push(path);
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::testing::FnTransform;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::FutureExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn limits() -> WorkflowLimits {
        WorkflowLimits { delivery_delay: Duration::ZERO, ..Default::default() }
    }

    fn image(name: &str, len: usize) -> InputFile {
        InputFile::new(name, Some("image/png".to_string()), vec![7u8; len])
    }

    fn images_only() -> BatchWorkflow {
        BatchWorkflow::new(AcceptPolicy::new("images only").mime_prefix("image/"), limits())
    }

    /// Halves the input and tags it with the configured format.
    fn halver() -> FnTransform {
        FnTransform::new("halver", |input, config| {
            async move {
                let ext = config.format.unwrap_or_else(|| "out".to_string());
                let half = input.data.slice(..input.data.len() / 2);
                Ok(TransformOutput::Single { data: half, ext })
            }
            .boxed()
        })
    }

    fn failing_on(bad: &'static str) -> FnTransform {
        FnTransform::new("picky", move |input, _| {
            async move {
                if input.name == bad {
                    anyhow::bail!("corrupt input");
                }
                Ok(TransformOutput::Single { data: input.data, ext: "bin".into() })
            }
            .boxed()
        })
    }

    struct BrokenSetup;

    #[async_trait]
    impl Transform for BrokenSetup {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn prepare(&self, _config: &ConversionConfig) -> anyhow::Result<()> {
            anyhow::bail!("library unavailable")
        }

        async fn transform(&self, _input: &InputFile, _config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
            unreachable!("prepare failed")
        }
    }

    #[derive(Default)]
    struct Sequential {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transform for Sequential {
        fn name(&self) -> &'static str {
            "sequential"
        }

        async fn transform(&self, input: &InputFile, _config: &ConversionConfig) -> anyhow::Result<TransformOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.order.lock().unwrap().push(input.name.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(TransformOutput::Renamed { data: input.data.clone(), name: input.name.clone() })
        }
    }

    struct Concat;

    #[async_trait]
    impl Combiner for Concat {
        fn name(&self) -> &'static str {
            "concat"
        }

        fn output_name(&self) -> String {
            "merged.bin".to_string()
        }

        async fn combine(&self, inputs: &[InputFile], _config: &ConversionConfig) -> anyhow::Result<Bytes> {
            Ok(inputs.iter().flat_map(|f| f.data.iter().copied()).collect::<Vec<u8>>().into())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResultSink for MemorySink {
        async fn deliver(&self, result: &ConversionResult) -> anyhow::Result<PathBuf> {
            self.seen.lock().unwrap().push(result.name.clone());
            Ok(PathBuf::from(&result.name))
        }
    }

    #[test]
    fn enqueue_filters_and_keeps_order() {
        let mut wf = images_only();
        let report = wf.enqueue(vec![
            image("a.png", 4),
            InputFile::new("notes.txt", Some("text/plain".into()), vec![1]),
            image("b.png", 4),
        ]);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0], WorkflowError::RejectedInput { ref name, .. } if name == "notes.txt"));

        let names: Vec<_> = wf.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert_eq!(wf.statuses(), [ItemStatus::Waiting, ItemStatus::Waiting]);
    }

    #[test]
    fn remove_shifts_later_items_and_checks_bounds() {
        let mut wf = images_only();
        wf.enqueue(vec![image("a.png", 1), image("b.png", 1), image("c.png", 1)]);

        let removed = wf.remove(1).unwrap();
        assert_eq!(removed.name, "b.png");
        assert_eq!(wf.files()[1].name, "c.png");
        assert_eq!(wf.len(), 2);
        assert_eq!(wf.statuses().len(), 2);

        assert!(matches!(wf.remove(2), Err(WorkflowError::IndexOutOfRange { index: 2, len: 2 })));
    }

    #[tokio::test]
    async fn run_all_converts_every_item() {
        let mut wf = images_only();
        wf.enqueue(vec![image("a.png", 10), image("b.jpg", 10), image("c.gif", 10)]);
        let config = ConversionConfig { format: Some("jpg".into()), ..Default::default() };

        let summary = wf.run_all(&config, &halver()).await.unwrap();

        assert_eq!(summary, BatchSummary { done: 3, failed: 0 });
        let names: Vec<_> = wf.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg", "c.jpg"]);
        for st in wf.statuses() {
            assert_eq!(*st, ItemStatus::Done { size_bytes: 5, saved_percent: Some(50) });
        }
        assert_eq!(wf.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn a_failing_item_does_not_stop_the_batch() {
        let mut wf = images_only();
        wf.enqueue(vec![image("a.png", 3), image("bad.png", 3), image("c.png", 3), image("d.png", 3)]);

        let summary = wf.run_all(&ConversionConfig::default(), &failing_on("bad.png")).await.unwrap();

        assert_eq!(summary, BatchSummary { done: 3, failed: 1 });
        assert!(matches!(&wf.statuses()[1], ItemStatus::Failed { reason } if reason.contains("corrupt")));
        assert!(wf.statuses().iter().all(ItemStatus::is_terminal));
        let done = wf.statuses().iter().filter(|s| matches!(s, ItemStatus::Done { .. })).count();
        assert_eq!(wf.results().len(), done);
        let sources: Vec<_> = wf.results().iter().map(|r| r.source_index).collect();
        assert_eq!(sources, [0, 2, 3]);
    }

    #[tokio::test]
    async fn items_run_one_at_a_time_in_queue_order() {
        let mut wf = images_only();
        wf.enqueue((0..5).map(|i| image(&format!("{i}.png"), 1)));
        let t = Sequential::default();

        wf.run_all(&ConversionConfig::default(), &t).await.unwrap();

        assert_eq!(t.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(*t.order.lock().unwrap(), ["0.png", "1.png", "2.png", "3.png", "4.png"]);
    }

    #[tokio::test]
    async fn setup_failure_aborts_before_touching_items() {
        let mut wf = images_only();
        wf.enqueue(vec![image("a.png", 1)]);

        let err = wf.run_all(&ConversionConfig::default(), &BrokenSetup).await.unwrap_err();

        assert!(matches!(err, WorkflowError::BatchSetup(ref m) if m.contains("library unavailable")));
        assert_eq!(wf.statuses(), [ItemStatus::Waiting]);
        assert!(wf.results().is_empty());
    }

    #[tokio::test]
    async fn empty_queue_still_completes() {
        let mut wf = images_only();
        let mut rx = wf.subscribe();

        let summary = wf.run_all(&ConversionConfig::default(), &halver()).await.unwrap();

        assert_eq!(summary, BatchSummary::default());
        let mut states = vec![];
        while let Ok(evt) = rx.try_recv() {
            if let WorkflowEvent::BatchStateChanged { state, .. } = evt {
                states.push(state);
            }
        }
        assert_eq!(states, [BatchState::Running, BatchState::Idle]);
    }

    #[tokio::test]
    async fn rerun_recomputes_from_scratch() {
        let mut wf = images_only();
        wf.enqueue(vec![image("a.png", 4), image("b.png", 4)]);
        let config = ConversionConfig { format: Some("webp".into()), ..Default::default() };

        wf.run_all(&config, &halver()).await.unwrap();
        wf.run_all(&config, &halver()).await.unwrap();

        assert_eq!(wf.results().len(), 2);
        assert_eq!(wf.statuses().len(), 2);
    }

    #[tokio::test]
    async fn clear_after_run_empties_everything() {
        let mut wf = images_only();
        wf.enqueue(vec![image("a.png", 4)]);
        wf.run_all(&ConversionConfig::default(), &halver()).await.unwrap();

        wf.clear();
        assert!(wf.is_empty());
        assert!(wf.statuses().is_empty());
        assert!(wf.results().is_empty());

        let summary = wf.run_all(&ConversionConfig::default(), &halver()).await.unwrap();
        assert_eq!(summary, BatchSummary::default());
        assert!(wf.results().is_empty());
    }

    #[tokio::test]
    async fn combine_requires_minimum_inputs() {
        let mut wf = BatchWorkflow::new(AcceptPolicy::new("pdf").extensions(&["pdf"]), limits());
        wf.enqueue(vec![InputFile::new("one.pdf", None, vec![1u8])]);

        let err = wf.run_combined(&ConversionConfig::default(), &Concat).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotEnoughInputs { required: 2, actual: 1 }));
        assert!(wf.results().is_empty());

        wf.enqueue(vec![InputFile::new("two.pdf", None, vec![2u8, 3])]);
        let summary = wf.run_combined(&ConversionConfig::default(), &Concat).await.unwrap();
        assert_eq!(summary, BatchSummary { done: 2, failed: 0 });
        assert_eq!(wf.results().len(), 1);
        assert_eq!(wf.results()[0].name, "merged.bin");
        assert_eq!(&wf.results()[0].data[..], [1, 2, 3]);
    }

    #[tokio::test]
    async fn pages_output_yields_one_result_per_page() {
        let mut wf = BatchWorkflow::new(AcceptPolicy::new(""), limits());
        wf.enqueue(vec![InputFile::new("deck.pdf", None, vec![0u8; 8])]);
        let split = FnTransform::new("split", |_, _| {
            async move {
                Ok(TransformOutput::Pages {
                    pages: vec![Bytes::from_static(b"p1"), Bytes::from_static(b"p2")],
                    ext: "pdf".into(),
                })
            }
            .boxed()
        });

        wf.run_all(&ConversionConfig::default(), &split).await.unwrap();

        let names: Vec<_> = wf.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["deck-page-1.pdf", "deck-page-2.pdf"]);
        assert_eq!(wf.statuses()[0], ItemStatus::Done { size_bytes: 4, saved_percent: Some(50) });
    }

    #[tokio::test]
    async fn download_all_delivers_in_order_and_keeps_results() {
        let mut wf = images_only();
        wf.enqueue(vec![image("z.png", 2), image("a.png", 2)]);
        wf.run_all(&ConversionConfig::default(), &halver()).await.unwrap();
        let sink = MemorySink::default();

        let paths = wf.download_all(&sink).await.unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(*sink.seen.lock().unwrap(), ["z.out", "a.out"]);
        assert_eq!(wf.results().len(), 2);
        assert_eq!(wf.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_delivery_is_paced() {
        let mut wf = BatchWorkflow::new(
            AcceptPolicy::new(""),
            WorkflowLimits { delivery_delay: Duration::from_millis(300), ..Default::default() },
        );
        wf.enqueue((0..3).map(|i| image(&format!("{i}.png"), 2)));
        wf.run_all(&ConversionConfig::default(), &halver()).await.unwrap();

        let start = tokio::time::Instant::now();
        wf.download_all(&MemorySink::default()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(600));
    }
}
