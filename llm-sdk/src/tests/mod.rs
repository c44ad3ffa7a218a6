//! Integration-style tests for the LLM SDK

pub mod openai_mock_tests;
