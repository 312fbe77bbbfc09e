//! Unit tests for machine pipelines and lifecycle orchestration.
