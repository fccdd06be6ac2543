//! parkinsons-classifiers: voice-measurement analysis and classification.
//!
//! This crate loads the Parkinson's voice-measurement CSV schema, reports
//! outliers, prepares the data (imputation, scaling, stratified splitting,
//! top-K feature selection), trains logistic regression, random forest and
//! SVM classifiers with stratified cross-validation, and evaluates them on a
//! held-out split with optional HTML reports.
//!
//! `pipeline` ties the stages together and `registry` holds the trained
//! pipeline for callers that serve predictions.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod feature_selection;
pub mod io;
pub mod models;
pub mod outliers;
pub mod pipeline;
pub mod preprocessing;
pub mod registry;
pub mod report;
pub mod stats;
pub mod training;
