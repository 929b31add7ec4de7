//! audiodrop-core
//!
//! Core building blocks for the audiodrop relay: a URL comes in, an audio
//! file goes out, and the scratch space it passed through is reclaimed.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request, artifact, errors, outcome）
//! - **ports**: 抽象化レイヤー（MediaExtractor, ArtifactSink, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, runner, reclaimer, relay, dispatcher）
//! - **impls**: 実装（YtDlpExtractor と テスト用の ScriptedExtractor）
//! - **config**: TOML 設定
//! - **observability**: tracing の初期化とジョブカウンタ

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
