mod helpers;
mod scenarios;
mod streaming;
