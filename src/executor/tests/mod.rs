mod tests_statements;
