//! 工作线程执行器
//!
//! 脚本引擎在专用线程上创建和运行，拥有者线程通过通道发送命令并阻塞等待结果，
//! 结果总是先回到拥有者线程再被应用。

use super::ScriptExecutor;
use crate::core::{ExecutorError, ExecutorResult};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde_json::Value;
use std::thread;

/// 工作线程命令
enum WorkerCommand {
    /// 执行脚本
    Evaluate {
        script: String,
        reply: Sender<ExecutorResult<Value>>,
    },
    /// 设置全局变量
    SetGlobal {
        name: String,
        value: Value,
        reply: Sender<ExecutorResult<()>>,
    },
    /// 重置上下文
    Reset { reply: Sender<ExecutorResult<()>> },
    /// 关闭工作线程
    Shutdown,
}

/// 在工作线程上运行的执行器
pub struct ThreadedExecutor {
    name: String,
    command_sender: Sender<WorkerCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ThreadedExecutor {
    /// 启动工作线程并在其中构造执行器
    ///
    /// 构造失败时错误会传回调用方。
    pub fn spawn<F>(name: impl Into<String>, constructor: F) -> ExecutorResult<Self>
    where
        F: FnOnce() -> ExecutorResult<Box<dyn ScriptExecutor>> + Send + 'static,
    {
        let name = name.into();
        let (command_sender, command_receiver) = unbounded::<WorkerCommand>();
        let (init_sender, init_receiver) = bounded::<ExecutorResult<()>>(1);

        let worker = thread::Builder::new()
            .name(format!("{name}-executor"))
            .spawn(move || match constructor() {
                Ok(executor) => {
                    let _ = init_sender.send(Ok(()));
                    Self::worker_loop(executor, command_receiver);
                }
                Err(e) => {
                    let _ = init_sender.send(Err(e));
                }
            })
            .map_err(|e| ExecutorError::RuntimeInit(e.to_string()))?;

        init_receiver
            .recv()
            .map_err(|_| ExecutorError::WorkerGone)??;

        tracing::debug!(target: "executor", executor = %name, "Executor worker started");
        Ok(Self {
            name,
            command_sender,
            worker: Some(worker),
        })
    }

    /// 工作线程主循环
    fn worker_loop(mut executor: Box<dyn ScriptExecutor>, commands: Receiver<WorkerCommand>) {
        // 通道关闭时退出
        while let Ok(command) = commands.recv() {
            match command {
                WorkerCommand::Evaluate { script, reply } => {
                    let _ = reply.send(executor.evaluate(&script));
                }
                WorkerCommand::SetGlobal { name, value, reply } => {
                    let _ = reply.send(executor.set_global(&name, &value));
                }
                WorkerCommand::Reset { reply } => {
                    let _ = reply.send(executor.reset());
                }
                WorkerCommand::Shutdown => break,
            }
        }
    }

    fn request<T>(
        &self,
        command: impl FnOnce(Sender<ExecutorResult<T>>) -> WorkerCommand,
    ) -> ExecutorResult<T> {
        let (reply, response) = bounded(1);
        self.command_sender
            .send(command(reply))
            .map_err(|_| ExecutorError::WorkerGone)?;
        response.recv().map_err(|_| ExecutorError::WorkerGone)?
    }
}

impl ScriptExecutor for ThreadedExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&mut self, script: &str) -> ExecutorResult<Value> {
        let script = script.to_string();
        self.request(|reply| WorkerCommand::Evaluate { script, reply })
    }

    fn set_global(&mut self, name: &str, value: &Value) -> ExecutorResult<()> {
        let name = name.to_string();
        let value = value.clone();
        self.request(|reply| WorkerCommand::SetGlobal { name, value, reply })
    }

    fn reset(&mut self) -> ExecutorResult<()> {
        self.request(|reply| WorkerCommand::Reset { reply })
    }
}

impl Drop for ThreadedExecutor {
    fn drop(&mut self) {
        let _ = self.command_sender.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
