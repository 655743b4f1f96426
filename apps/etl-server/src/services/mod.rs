pub mod experiment_etl;
