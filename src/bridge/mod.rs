//! 桥接核心
//!
//! [`Bridge`] 拥有就绪状态机、出站调用队列和源码加载生命周期，所有状态变更都发生在
//! 拥有者线程上。其他线程通过 [`BridgeHandle`] 投递消息，由 [`Bridge::pump`] 按到达顺序处理。
//!
//! 排序保证：
//! - 就绪前入队的调用先于就绪后入队的调用发出
//! - 一次刷新保持入队顺序
//! - 模块表注入先于第一次刷新

pub mod handle;
pub mod host;
pub mod queue;
pub mod source;
pub mod state;
pub mod watcher;

pub use handle::{BridgeHandle, BridgeMessage};
pub use host::{HeadlessUiManager, HostHandles, UiManager};
pub use queue::CallQueue;
pub use source::{FileSourceLoader, SourceCompletion, SourceLoader, TokioSourceLoader};
pub use state::BridgeState;
pub use watcher::BundleWatcher;

use crate::bindings::{
    invocation_script, CallBatch, CallRecord, ResultDocument, CALL_FUNCTION, CALL_FUNCTIONS,
    CONFIG_GLOBAL, FLUSHED_QUEUE, INVOKE_CALLBACK,
};
use crate::config::BridgeConfig;
use crate::core::{
    BridgeError, BridgeResult, DiagnosticKind, DiagnosticSink, Diagnostics, ExecutorError,
    ModuleError, SourceError,
};
use crate::dispatch::{CallbackCode, EventDispatcher, PromiseRegistry};
use crate::modules::builtin::{declare_builtins, APP_REGISTRY_MODULE, RUN_APPLICATION_METHOD};
use crate::modules::{
    InvokeContext, MethodKind, MethodSpec, ModuleId, ModuleManifest, ModuleRegistry, NativeModule,
};
use crate::scripting::{ExecutorFactory, ScriptExecutor};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// 桥接对外的通知
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeNotification {
    StateChanged { from: BridgeState, to: BridgeState },
    ReadyChanged(bool),
    JsAppStartedChanged(bool),
    LoadFailed { url: String, reason: String },
}

/// 一次结果处理的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
}

/// 桥接上下文
pub struct Bridge {
    config: BridgeConfig,
    state: BridgeState,
    ready: bool,
    js_app_started: bool,
    /// 当前执行器上下文里是否已经注入过模块表或执行过脚本包
    script_loaded: bool,
    registry: ModuleRegistry,
    queue: CallQueue,
    promises: PromiseRegistry,
    diagnostics: Diagnostics,
    executor: Option<Box<dyn ScriptExecutor>>,
    executor_factory: ExecutorFactory,
    ui_manager: Option<Box<dyn UiManager>>,
    source_loader: Box<dyn SourceLoader>,
    host: HostHandles,
    handle: BridgeHandle,
    inbox: Receiver<BridgeMessage>,
    observers: Vec<Sender<BridgeNotification>>,
    /// 当前加载的代号，用于忽略被取代的加载结果
    generation: u64,
    bundle_url: Option<Url>,
    watcher: Option<BundleWatcher>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Bridge {
    /// 创建桥接，协作者通过 `set_*` 设置后再调用 [`Bridge::init`]
    pub fn new(config: BridgeConfig) -> Self {
        let (handle, inbox) = BridgeHandle::channel();
        Self {
            config,
            state: BridgeState::Uninitialized,
            ready: false,
            js_app_started: false,
            script_loaded: false,
            registry: ModuleRegistry::new(),
            queue: CallQueue::new(),
            promises: PromiseRegistry::new(),
            diagnostics: Diagnostics::new(),
            executor: None,
            executor_factory: ExecutorFactory::with_builtins(),
            ui_manager: None,
            source_loader: Box::new(FileSourceLoader),
            host: HostHandles::default(),
            handle,
            inbox,
            observers: Vec::new(),
            generation: 0,
            bundle_url: None,
            watcher: None,
        }
    }

    // ---- 协作者 ----

    pub fn set_executor(&mut self, executor: Box<dyn ScriptExecutor>) {
        self.executor = Some(executor);
    }

    pub fn set_executor_factory(&mut self, factory: ExecutorFactory) {
        self.executor_factory = factory;
    }

    /// 按名称选择执行器，`init` 时由工厂创建
    pub fn set_executor_name(&mut self, name: impl Into<String>) {
        self.config.executor_name = Some(name.into());
    }

    pub fn set_ui_manager(&mut self, ui_manager: Box<dyn UiManager>) {
        self.ui_manager = Some(ui_manager);
    }

    pub fn set_source_loader(&mut self, loader: Box<dyn SourceLoader>) {
        self.source_loader = loader;
    }

    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.diagnostics.set_sink(sink);
    }

    pub fn set_host_handles(&mut self, host: HostHandles) {
        self.host = host;
    }

    pub fn set_plugins_path(&mut self, path: impl Into<PathBuf>) {
        self.config.plugins_path = Some(path.into());
    }

    // ---- 注册 ----

    /// 注册原生模块，只能在第一次就绪之前调用
    pub fn register_module(&mut self, module: Box<dyn NativeModule>) -> BridgeResult<ModuleId> {
        Ok(self.registry.register_module(module)?)
    }

    /// 注册脚本侧模块
    pub fn register_declared(
        &mut self,
        name: impl Into<String>,
        methods: Vec<MethodSpec>,
    ) -> BridgeResult<ModuleId> {
        Ok(self.registry.register_declared(name, methods)?)
    }

    // ---- 生命周期 ----

    /// `Uninitialized → Initializing`
    ///
    /// 缺少 UI 管理器或执行器时失败，状态保持 `Uninitialized`。
    pub fn init(&mut self) -> BridgeResult<()> {
        if self.state != BridgeState::Uninitialized {
            return Err(BridgeError::InvalidState {
                operation: "init",
                state: self.state,
            });
        }
        if self.ui_manager.is_none() {
            return Err(self.init_failed(BridgeError::MissingCollaborator("ui_manager")));
        }
        if self.executor.is_none() {
            let Some(name) = self.config.executor_name.clone() else {
                return Err(self.init_failed(BridgeError::MissingCollaborator("executor")));
            };
            match self.executor_factory.create(&name) {
                Ok(executor) => self.executor = Some(executor),
                Err(e) => return Err(self.init_failed(e.into())),
            }
        }
        if let Some(dir) = self.config.plugins_path.clone() {
            if let Err(e) = self.register_manifests(&dir) {
                return Err(self.init_failed(e));
            }
        }

        self.transition(BridgeState::Initializing);
        tracing::info!(
            target: "bridge",
            modules = self.registry.len(),
            executor = self.executor.as_ref().map(|e| e.name()).unwrap_or_default(),
            "Bridge initialized"
        );
        Ok(())
    }

    fn init_failed(&self, error: BridgeError) -> BridgeError {
        self.diagnostics
            .report(DiagnosticKind::Init, "bridge", error.to_string());
        error
    }

    fn register_manifests(&mut self, dir: &std::path::Path) -> BridgeResult<()> {
        for module in ModuleManifest::discover(dir)? {
            if self.registry.contains(&module.name) {
                tracing::debug!(target: "registry", module = %module.name, "Manifest module already registered");
                continue;
            }
            self.registry.register_declared(module.name, module.methods)?;
        }
        Ok(())
    }

    /// 加载配置中的脚本包
    pub fn start(&mut self) -> BridgeResult<()> {
        let url = self
            .config
            .bundle_url
            .clone()
            .ok_or(SourceError::MissingUrl)?;
        self.load_bundle(&url)
    }

    /// `Initializing | Ready | Failed → LoadingSource`
    ///
    /// 地址无效时直接进入 `Failed` 并返回错误；读取和执行的结果通过通知和状态观察。
    /// 上一次加载在读取阶段就失败时，就绪前入队的调用保留到这次加载。
    pub fn load_bundle(&mut self, url: &str) -> BridgeResult<()> {
        match self.state {
            BridgeState::Initializing => {}
            BridgeState::Ready => self.teardown_script_state(),
            BridgeState::Failed if self.script_loaded => self.teardown_script_state(),
            BridgeState::Failed => {}
            state => {
                return Err(BridgeError::InvalidState {
                    operation: "load_bundle",
                    state,
                })
            }
        }

        match source::parse_bundle_url(url) {
            Ok(parsed) => {
                self.begin_loading(parsed);
                Ok(())
            }
            Err(e) => {
                self.transition(BridgeState::LoadingSource);
                self.generation += 1;
                self.bundle_url = None;
                self.fail_load(url.to_string(), e.clone());
                Err(e.into())
            }
        }
    }

    /// 销毁脚本状态并从头加载当前脚本包
    ///
    /// 重载前入队的调用全部丢弃，未解决的 promise 被放弃。
    pub fn reload(&mut self) -> BridgeResult<()> {
        if self.state == BridgeState::Uninitialized {
            return Err(BridgeError::InvalidState {
                operation: "reload",
                state: self.state,
            });
        }

        let url = match self.bundle_url.clone() {
            Some(url) => Ok(url),
            None => match self.config.bundle_url.as_deref() {
                Some(raw) => source::parse_bundle_url(raw),
                None => Err(SourceError::MissingUrl),
            },
        };

        tracing::info!(target: "bridge", "Reloading");
        self.transition(BridgeState::Reloading);
        self.teardown_script_state();

        match url {
            Ok(url) => {
                self.begin_loading(url);
                Ok(())
            }
            Err(e) => {
                let raw = self.config.bundle_url.clone().unwrap_or_default();
                self.transition(BridgeState::LoadingSource);
                self.generation += 1;
                self.fail_load(raw, e.clone());
                Err(e.into())
            }
        }
    }

    /// 关闭桥接，回到 `Uninitialized`
    pub fn shutdown(&mut self) {
        if self.state == BridgeState::Uninitialized {
            return;
        }
        self.teardown_script_state();
        self.watcher = None;
        self.generation += 1;
        self.registry.unseal();
        self.transition(BridgeState::Uninitialized);
        tracing::info!(target: "bridge", "Bridge shut down");
    }

    fn begin_loading(&mut self, url: Url) {
        self.transition(BridgeState::LoadingSource);
        self.generation += 1;
        if self.config.watch_bundle {
            self.watch_bundle(&url);
        }
        self.bundle_url = Some(url.clone());

        tracing::info!(target: "source", url = %url, generation = self.generation, "Loading bundle");
        let completion = SourceCompletion::new(self.generation, url, self.handle.clone());
        self.source_loader.load(completion);
        // 同步加载器已经投递了结果
        self.pump();
    }

    fn watch_bundle(&mut self, url: &Url) {
        let Ok(path) = source::bundle_path(url) else {
            return;
        };
        if self.watcher.as_ref().is_some_and(|w| w.path() == path) {
            return;
        }
        match BundleWatcher::watch(path, self.handle.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => tracing::warn!(target: "source", error = %e, "Bundle watching disabled"),
        }
    }

    fn teardown_script_state(&mut self) {
        let mut dropped = self.queue.clear();
        // 投递给旧上下文的消息一并作废
        for message in self.inbox.try_iter() {
            if let BridgeMessage::EnqueueCall(_) = message {
                dropped += 1;
            }
        }
        let abandoned = self.promises.abandon_all();

        self.set_ready(false);
        self.set_js_app_started(false);
        self.script_loaded = false;
        if let Some(executor) = self.executor.as_mut() {
            if let Err(e) = executor.reset() {
                tracing::warn!(target: "executor", error = %e, "Executor reset failed");
            }
        }
        if let Some(ui_manager) = &self.ui_manager {
            ui_manager.invalidate();
        }
        self.registry.invalidate_all();

        tracing::debug!(target: "bridge", dropped, abandoned, "Script state torn down");
    }

    /// 源码加载成功
    ///
    /// 注入模块表、执行脚本包、进入 `Ready`、刷新队列，配置了应用名时发出启动调用。
    pub fn sources_finished(&mut self, generation: u64, source: String) {
        if !self.is_current_load(generation) {
            tracing::debug!(target: "source", generation, current = self.generation, "Ignoring stale bundle");
            return;
        }
        let url = self.current_url();

        if let Err(e) = declare_builtins(&mut self.registry) {
            return self.fail_load(url, SourceError::Evaluation(e.to_string()));
        }
        self.registry.seal();
        self.script_loaded = true;

        let module_config = self.registry.remote_module_config();
        let injected = match self.executor.as_mut() {
            Some(executor) => executor
                .set_global(CONFIG_GLOBAL, &module_config)
                .map_err(BridgeError::from),
            None => Err(BridgeError::MissingCollaborator("executor")),
        };
        if let Err(e) = injected.and_then(|_| self.evaluate_script(&source)) {
            return self.fail_load(url, SourceError::Evaluation(e.to_string()));
        }

        self.transition(BridgeState::Ready);
        self.set_ready(true);
        if let Some(ui_manager) = &self.ui_manager {
            ui_manager.bridge_ready(&self.handle);
        }
        self.flush_queue();

        if let Some(app_name) = self.config.app_name.clone() {
            let props = self
                .config
                .initial_properties
                .clone()
                .unwrap_or_else(|| json!({}));
            // 失败已经转为加载失败
            let _ = self.enqueue_run_app_call(vec![Value::String(app_name), props]);
        }
    }

    /// 源码加载失败
    pub fn sources_load_failed(&mut self, generation: u64, error: SourceError) {
        if !self.is_current_load(generation) {
            tracing::debug!(target: "source", generation, current = self.generation, "Ignoring stale load failure");
            return;
        }
        let url = self.current_url();
        self.fail_load(url, error);
    }

    fn is_current_load(&self, generation: u64) -> bool {
        generation == self.generation && self.state == BridgeState::LoadingSource
    }

    fn current_url(&self) -> String {
        self.bundle_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_default()
    }

    fn fail_load(&mut self, url: String, error: SourceError) {
        self.transition(BridgeState::Failed);
        self.set_ready(false);
        self.diagnostics
            .report(DiagnosticKind::LoadFailure, "source", format!("{url}: {error}"));
        self.notify(BridgeNotification::LoadFailed {
            url,
            reason: error.to_string(),
        });
    }

    fn transition(&mut self, next: BridgeState) {
        let from = self.state;
        if from == next {
            return;
        }
        if !from.can_transition_to(next) {
            tracing::warn!(target: "bridge", %from, to = %next, "Unexpected state transition");
        }
        tracing::debug!(target: "bridge", %from, to = %next, "State changed");
        self.state = next;
        self.notify(BridgeNotification::StateChanged { from, to: next });
    }

    fn set_ready(&mut self, ready: bool) {
        if self.ready != ready {
            self.ready = ready;
            self.notify(BridgeNotification::ReadyChanged(ready));
        }
    }

    fn set_js_app_started(&mut self, started: bool) {
        if self.js_app_started != started {
            self.js_app_started = started;
            self.notify(BridgeNotification::JsAppStartedChanged(started));
        }
    }

    fn notify(&mut self, notification: BridgeNotification) {
        self.observers
            .retain(|observer| observer.send(notification.clone()).is_ok());
    }

    // ---- 消息循环 ----

    /// 处理收件箱中的所有消息，就绪时刷新队列
    ///
    /// 返回处理的消息数。
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(message) = self.inbox.try_recv() {
            processed += 1;
            self.handle_message(message);
        }
        if self.ready {
            self.flush_queue();
        }
        processed
    }

    /// 最多等待 `timeout` 直到有消息到达，然后同 [`Bridge::pump`]
    pub fn wait_and_pump(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_message(message);
                1 + self.pump()
            }
            Err(_) => self.pump(),
        }
    }

    fn handle_message(&mut self, message: BridgeMessage) {
        match message {
            BridgeMessage::EnqueueCall(call) => self.queue.push(call),
            BridgeMessage::PromiseCallback { code, args } => {
                self.invoke_promise_callback(code, args);
            }
            BridgeMessage::SourcesFinished { generation, source } => {
                self.sources_finished(generation, source)
            }
            BridgeMessage::SourcesLoadFailed { generation, error } => {
                self.sources_load_failed(generation, error)
            }
            BridgeMessage::Reload => {
                if let Err(e) = self.reload() {
                    tracing::warn!(target: "bridge", error = %e, "Requested reload failed");
                }
            }
        }
    }

    // ---- 出站调用 ----

    /// 入队一个发往脚本的调用，从不阻塞
    ///
    /// 调用在下一次 [`Bridge::pump`] 时进入队列，就绪后按入队顺序整批发出。
    pub fn enqueue_js_call(&self, module: &str, method: &str, args: Vec<Value>) {
        self.handle.enqueue_js_call(module, method, args);
    }

    /// 派发事件
    pub fn dispatch_event(&self, name: &str, payload: Value) {
        self.handle.dispatch_event(name, payload);
    }

    /// 把队列中的调用编码成一个批次发给脚本，返回发出的调用数
    ///
    /// 无法解析的调用逐个报告，不影响其他调用。
    pub fn flush_queue(&mut self) -> usize {
        if !self.ready || self.queue.is_empty() {
            return 0;
        }

        let mut batch = CallBatch::new();
        for call in self.queue.drain() {
            match self.registry.lookup(&call.module, &call.method) {
                Ok((module_id, method_id)) => {
                    batch.push(CallRecord::new(module_id, method_id, call.args))
                }
                Err(e) => self.diagnostics.report(
                    DiagnosticKind::Resolution,
                    "bridge",
                    format!("cannot encode {}.{}: {e}", call.module, call.method),
                ),
            }
        }
        if batch.is_empty() {
            return 0;
        }

        let sent = batch.len();
        tracing::trace!(target: "bridge", calls = sent, "Flushing call batch");
        // 失败已经报告
        let _ = self.invoke_and_process(CALL_FUNCTIONS, &[batch.to_wire()]);
        sent
    }

    /// 启动应用
    ///
    /// 只能在就绪后调用。调用失败按加载失败处理，成功后 `js_app_started` 变为 `true`。
    pub fn enqueue_run_app_call(&mut self, args: Vec<Value>) -> BridgeResult<()> {
        if !self.ready {
            return Err(BridgeError::InvalidState {
                operation: "enqueue_run_app_call",
                state: self.state,
            });
        }
        self.flush_queue();

        let script = invocation_script(
            CALL_FUNCTION,
            &[
                Value::from(APP_REGISTRY_MODULE),
                Value::from(RUN_APPLICATION_METHOD),
                Value::Array(args),
            ],
        );
        match self.execute_source_code(script.as_bytes()) {
            Ok(result) => {
                self.set_js_app_started(true);
                tracing::info!(target: "bridge", "Application started");
                match ResultDocument::from_value(&result) {
                    Ok(document) => {
                        self.process_result(document);
                    }
                    Err(e) => {
                        self.diagnostics
                            .report(DiagnosticKind::Protocol, "bridge", e.to_string())
                    }
                }
                Ok(())
            }
            Err(e) => {
                let url = self.current_url();
                self.fail_load(url, SourceError::Evaluation(e.to_string()));
                Err(e)
            }
        }
    }

    /// 让脚本交出它自己排队的原生调用（定时器回调等）并处理
    pub fn flush_native_queue(&mut self) -> BridgeResult<DispatchReport> {
        if !self.ready {
            return Err(BridgeError::InvalidState {
                operation: "flush_native_queue",
                state: self.state,
            });
        }
        self.invoke_and_process(FLUSHED_QUEUE, &[])
    }

    // ---- promise ----

    /// 登记一个待解决的回调码
    pub fn register_pending_promise(&self, code: CallbackCode) -> BridgeResult<()> {
        Ok(self.promises.register(code)?)
    }

    /// 解决回调码并把结果送回脚本
    ///
    /// 未知或已解决的码只记录一次诊断，返回 `false`。
    pub fn invoke_promise_callback(&mut self, code: CallbackCode, args: Vec<Value>) -> bool {
        if !self.promises.resolve(code, &args) {
            self.diagnostics.report(
                DiagnosticKind::UnknownPromise,
                "dispatch",
                format!("callback code {code} is not pending"),
            );
            return false;
        }
        if !self.ready {
            return true;
        }

        // 先发出之前入队的调用
        self.flush_queue();
        let _ = self.invoke_and_process(INVOKE_CALLBACK, &[json!(code.0), Value::Array(args)]);
        true
    }

    // ---- 脚本执行 ----

    /// 调用脚本侧批处理对象的入口并处理返回的结果文档
    pub fn invoke_and_process(
        &mut self,
        method: &str,
        args: &[Value],
    ) -> BridgeResult<DispatchReport> {
        let script = invocation_script(method, args);
        let result = match self.evaluate_script(&script) {
            Ok(result) => result,
            Err(e) => {
                self.diagnostics
                    .report(DiagnosticKind::Evaluation, "executor", format!("{method}: {e}"));
                if matches!(e, BridgeError::Executor(ExecutorError::WorkerGone)) {
                    let url = self.current_url();
                    self.fail_load(url, SourceError::Evaluation(e.to_string()));
                }
                return Err(e);
            }
        };

        let document = ResultDocument::from_value(&result).map_err(|e| {
            self.diagnostics
                .report(DiagnosticKind::Protocol, "bridge", format!("{method}: {e}"));
            BridgeError::from(e)
        })?;
        Ok(self.process_result(document))
    }

    /// 直接执行脚本文本，脚本错误作为诊断报告并返回
    pub fn execute_source_code(&mut self, source: &[u8]) -> BridgeResult<Value> {
        let result = match std::str::from_utf8(source) {
            Ok(script) => self.evaluate_script(script),
            Err(e) => Err(ExecutorError::Evaluation(format!("script is not valid UTF-8: {e}")).into()),
        };
        result.map_err(|e| {
            self.diagnostics
                .report(DiagnosticKind::Evaluation, "executor", e.to_string());
            e
        })
    }

    fn evaluate_script(&mut self, script: &str) -> BridgeResult<Value> {
        let executor = self
            .executor
            .as_mut()
            .ok_or(BridgeError::MissingCollaborator("executor"))?;
        Ok(executor.evaluate(script)?)
    }

    /// 逐项解析并调用结果文档中的原生调用
    ///
    /// 单项失败只报告，不影响其他项。
    pub fn process_result(&mut self, document: ResultDocument) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (index, entry) in document.entries.into_iter().enumerate() {
            let outcome = entry
                .map_err(BridgeError::from)
                .and_then(|record| self.dispatch_record(record));
            match outcome {
                Ok(()) => report.invoked += 1,
                Err(e) => {
                    report.failed += 1;
                    let kind = match &e {
                        BridgeError::Registry(_) => DiagnosticKind::Resolution,
                        BridgeError::Protocol(_) | BridgeError::Promise(_) => {
                            DiagnosticKind::Protocol
                        }
                        _ => DiagnosticKind::Module,
                    };
                    self.diagnostics
                        .report(kind, "bridge", format!("call {index}: {e}"));
                }
            }
        }
        if report.invoked + report.failed > 0 {
            tracing::trace!(target: "bridge", invoked = report.invoked, failed = report.failed, "Processed result document");
        }
        report
    }

    fn dispatch_record(&mut self, record: CallRecord) -> BridgeResult<()> {
        let CallRecord {
            module_id,
            method_id,
            mut args,
        } = record;

        let kind = self.registry.resolve_method(module_id, method_id)?.kind;
        let promise = match kind {
            MethodKind::Sync => None,
            MethodKind::Promise => {
                let raw = args.pop().ok_or_else(|| {
                    ModuleError::InvalidArguments("missing callback code".to_string())
                })?;
                let code = CallbackCode::from_value(&raw)?;
                self.promises.register(code)?;
                Some(code)
            }
        };

        let headless = HeadlessUiManager;
        let ctx = InvokeContext {
            module_id,
            handle: &self.handle,
            host: &self.host,
            ui_manager: self.ui_manager.as_deref().unwrap_or(&headless),
            diagnostics: &self.diagnostics,
            promise,
        };
        let result = self.registry.invoke(module_id, method_id, args, &ctx);
        if result.is_err() {
            if let Some(code) = promise {
                self.promises.abandon(code);
            }
        }
        result
    }

    // ---- 观察 ----

    /// 订阅通知
    pub fn subscribe(&mut self) -> Receiver<BridgeNotification> {
        let (sender, receiver) = unbounded();
        self.observers.push(sender);
        receiver
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn js_app_started(&self) -> bool {
        self.js_app_started
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn promises(&self) -> &PromiseRegistry {
        &self.promises
    }

    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    pub fn event_dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(self.handle.clone())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn host_handles(&self) -> &HostHandles {
        &self.host
    }

    pub fn bundle_url(&self) -> Option<&Url> {
        self.bundle_url.as_ref()
    }

    pub fn executor_name(&self) -> Option<&str> {
        self.executor
            .as_ref()
            .map(|e| e.name())
            .or(self.config.executor_name.as_deref())
    }

    /// 队列中等待发出的调用数
    pub fn queued_calls(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutorResult, RegistryError};
    use std::sync::Mutex;

    /// 记录脚本的执行器，`__fbBatchedBridge` 调用返回 `null`
    #[derive(Default, Clone)]
    struct Recorder {
        scripts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptExecutor for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn evaluate(&mut self, script: &str) -> ExecutorResult<Value> {
            self.scripts.lock().unwrap().push(script.to_string());
            if script.contains("throw") {
                return Err(ExecutorError::Evaluation("thrown".to_string()));
            }
            Ok(Value::Null)
        }

        fn set_global(&mut self, _name: &str, _value: &Value) -> ExecutorResult<()> {
            Ok(())
        }

        fn reset(&mut self) -> ExecutorResult<()> {
            Ok(())
        }
    }

    fn bridge_with(recorder: &Recorder) -> Bridge {
        let mut bridge = Bridge::default();
        bridge.set_executor(Box::new(recorder.clone()));
        bridge.set_ui_manager(Box::new(HeadlessUiManager));
        bridge
    }

    fn bundle(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.js");
        std::fs::write(&path, contents).unwrap();
        let url = Url::from_file_path(&path).unwrap().to_string();
        (dir, url)
    }

    #[test]
    fn test_init_requires_collaborators() {
        let mut bridge = Bridge::default();
        assert!(matches!(
            bridge.init(),
            Err(BridgeError::MissingCollaborator("ui_manager"))
        ));
        bridge.set_ui_manager(Box::new(HeadlessUiManager));
        assert!(matches!(
            bridge.init(),
            Err(BridgeError::MissingCollaborator("executor"))
        ));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert_eq!(bridge.diagnostics().count(DiagnosticKind::Init), 2);
    }

    #[test]
    fn test_unknown_executor_name() {
        let mut bridge = Bridge::default();
        bridge.set_ui_manager(Box::new(HeadlessUiManager));
        bridge.set_executor_name("spidermonkey");
        assert!(matches!(
            bridge.init(),
            Err(BridgeError::Executor(ExecutorError::UnknownExecutor(_)))
        ));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
    }

    #[test]
    fn test_load_requires_init() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);
        assert!(matches!(
            bridge.load_bundle("file:///tmp/index.js"),
            Err(BridgeError::InvalidState { .. })
        ));
        assert!(bridge.reload().is_err());
    }

    #[test]
    fn test_ready_after_load() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);
        let notifications = bridge.subscribe();
        bridge.init().unwrap();

        let (_dir, url) = bundle("var loaded = true;");
        bridge.load_bundle(&url).unwrap();

        assert_eq!(bridge.state(), BridgeState::Ready);
        assert!(bridge.is_ready());
        assert!(bridge.registry().is_sealed());
        assert_eq!(recorder.scripts.lock().unwrap()[0], "var loaded = true;");

        let ready: Vec<_> = notifications
            .try_iter()
            .filter(|n| matches!(n, BridgeNotification::ReadyChanged(_)))
            .collect();
        assert_eq!(ready, vec![BridgeNotification::ReadyChanged(true)]);
    }

    #[test]
    fn test_bundle_error_fails_load() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);
        bridge.init().unwrap();

        let (_dir, url) = bundle("throw new Error('boom')");
        bridge.load_bundle(&url).unwrap();
        assert_eq!(bridge.state(), BridgeState::Failed);
        assert!(!bridge.is_ready());
        assert_eq!(bridge.diagnostics().count(DiagnosticKind::LoadFailure), 1);
    }

    #[test]
    fn test_late_registration_sealed() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);
        bridge.init().unwrap();
        let (_dir, url) = bundle("1");
        bridge.load_bundle(&url).unwrap();

        assert!(matches!(
            bridge.register_declared("Late", Vec::new()),
            Err(BridgeError::Registry(RegistryError::Sealed(_)))
        ));

        bridge.shutdown();
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert!(bridge.register_declared("Late", Vec::new()).is_ok());
    }

    #[test]
    fn test_stale_completion_ignored() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);
        bridge.init().unwrap();
        let (_dir, url) = bundle("1");
        bridge.load_bundle(&url).unwrap();
        let generation = bridge.generation;

        bridge.sources_load_failed(generation - 1, SourceError::MissingUrl);
        bridge.sources_finished(generation, "2".to_string());
        assert_eq!(bridge.state(), BridgeState::Ready);
        assert_eq!(recorder.scripts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_execute_source_code_rejects_invalid_utf8() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);

        let result = bridge.execute_source_code(&[b'1', 0xff, 0xfe]);
        assert!(matches!(
            result,
            Err(BridgeError::Executor(ExecutorError::Evaluation(_)))
        ));
        assert!(recorder.scripts.lock().unwrap().is_empty());
        assert_eq!(bridge.diagnostics().count(DiagnosticKind::Evaluation), 1);

        assert_eq!(bridge.execute_source_code(b"1 + 1").unwrap(), Value::Null);
        assert_eq!(*recorder.scripts.lock().unwrap(), vec!["1 + 1".to_string()]);
    }

    #[test]
    fn test_flush_native_queue_requires_ready() {
        let recorder = Recorder::default();
        let mut bridge = bridge_with(&recorder);
        assert!(bridge.flush_native_queue().is_err());

        bridge.init().unwrap();
        let (_dir, url) = bundle("1");
        bridge.load_bundle(&url).unwrap();
        assert_eq!(bridge.flush_native_queue().unwrap(), DispatchReport::default());
        assert_eq!(
            recorder.scripts.lock().unwrap().last().unwrap(),
            "__fbBatchedBridge.flushedQueue()"
        );
    }
}
