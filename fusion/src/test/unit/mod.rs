mod lstm;
mod pipeline;
mod sigmoid;
