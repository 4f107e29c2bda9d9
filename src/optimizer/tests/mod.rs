mod tests_plans;
